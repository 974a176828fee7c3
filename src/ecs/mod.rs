use bevy_ecs::prelude::*;
use glam::{Mat4, Quat, Vec3};

/// 局部变换（相对父节点）
#[derive(Component, Clone, Copy, Debug)]
pub struct Transform {
    pub pos: Vec3,
    pub rot: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            pos: Vec3::ZERO,
            rot: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_translation(pos: Vec3) -> Self {
        Self {
            pos,
            ..Default::default()
        }
    }

    pub fn compute_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rot, self.pos)
    }
}

/// 世界变换（层级展开后的结果）
#[derive(Component, Clone, Copy, Debug)]
pub struct GlobalTransform {
    pub pos: Vec3,
    pub rot: Quat,
    pub scale: Vec3,
}

impl Default for GlobalTransform {
    fn default() -> Self {
        Self {
            pos: Vec3::ZERO,
            rot: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl From<Transform> for GlobalTransform {
    fn from(t: Transform) -> Self {
        Self {
            pos: t.pos,
            rot: t.rot,
            scale: t.scale,
        }
    }
}

impl GlobalTransform {
    /// 将子节点的局部变换叠加到父节点世界变换上
    ///
    /// 缩放按分量相乘（有损缩放），与常见引擎的 lossy scale 语义一致。
    pub fn mul_transform(&self, child: &Transform) -> Self {
        Self {
            pos: self.pos + self.rot * (self.scale * child.pos),
            rot: self.rot * child.rot,
            scale: self.scale * child.scale,
        }
    }

    pub fn compute_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rot, self.pos)
    }

    /// 前方向（右手坐标系，-Z）
    pub fn forward(&self) -> Vec3 {
        self.rot * Vec3::NEG_Z
    }
}

/// 粒子系统在空间转换中用到的全部变换数据
#[derive(Clone, Copy, Debug)]
pub struct SpaceTransform {
    pub local_to_world: Mat4,
    pub world_to_local: Mat4,
    pub world_scale: Vec3,
    pub local_scale: Vec3,
    pub rotation: Quat,
    pub position: Vec3,
}

impl Default for SpaceTransform {
    fn default() -> Self {
        Self::from_parts(&GlobalTransform::default(), &Transform::default())
    }
}

impl SpaceTransform {
    /// 根节点：局部变换即世界变换
    pub fn from_transform(transform: &Transform) -> Self {
        Self::from_parts(&GlobalTransform::from(*transform), transform)
    }

    pub fn from_parts(global: &GlobalTransform, local: &Transform) -> Self {
        let local_to_world = global.compute_matrix();
        Self {
            local_to_world,
            world_to_local: local_to_world.inverse(),
            world_scale: global.scale,
            local_scale: local.scale,
            rotation: global.rot,
            position: global.pos,
        }
    }

    /// 去掉世界缩放后的局部到世界矩阵
    pub fn unscaled_local_to_world(&self) -> Mat4 {
        self.local_to_world * Mat4::from_scale(self.world_scale.recip())
    }
}

/// 投影方式
#[derive(Clone, Copy, Debug)]
pub enum Projection {
    Orthographic { scale: f32, near: f32, far: f32 },
    Perspective { fov: f32, aspect: f32, near: f32, far: f32 },
}

impl Default for Projection {
    fn default() -> Self {
        Self::Perspective {
            fov: std::f32::consts::FRAC_PI_4,
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

#[derive(Component, Clone, Debug)]
pub struct Camera {
    pub is_active: bool,
    pub projection: Projection,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            is_active: true,
            projection: Projection::default(),
        }
    }
}

#[derive(Resource, Clone, Copy, Debug)]
pub struct Time {
    /// 本帧时间增量（秒）
    pub delta_seconds: f32,
    /// 自启动以来的单调时间（秒）
    pub elapsed_seconds: f64,
}

impl Default for Time {
    fn default() -> Self {
        Self {
            delta_seconds: 0.0,
            elapsed_seconds: 0.0,
        }
    }
}

impl Time {
    /// 推进一帧
    pub fn advance(&mut self, delta_seconds: f32) {
        self.delta_seconds = delta_seconds;
        self.elapsed_seconds += f64::from(delta_seconds);
    }

    /// 当前时间（秒）
    pub fn now(&self) -> f32 {
        self.elapsed_seconds as f32
    }
}
