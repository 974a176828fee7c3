//! 发射形状
//!
//! 每种形状一个纯函数：输入形状配置和随机数源，输出局部空间的初始位置和单位方向。

use glam::Vec3;
use rand::Rng;

use super::modules::{ShapeModule, ShapeType};

/// 形状采样结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmitShape {
    pub position: Vec3,
    /// 单位方向
    pub direction: Vec3,
}

impl Default for EmitShape {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            direction: Vec3::Z,
        }
    }
}

/// 按形状类型采样一个发射点
pub fn emit_shape<R: Rng + ?Sized>(shape: &ShapeModule, rng: &mut R) -> EmitShape {
    match shape.shape_type {
        ShapeType::Sphere => emit_sphere(shape, rng, false),
        ShapeType::Hemisphere => emit_sphere(shape, rng, true),
        ShapeType::Cone | ShapeType::ConeVolume => emit_cone(shape, rng),
        ShapeType::Box | ShapeType::BoxShell | ShapeType::BoxEdge => emit_box(shape, rng),
        ShapeType::Circle => emit_circle(shape, rng),
        ShapeType::Edge => emit_edge(shape, rng),
        ShapeType::Mesh => {
            tracing::warn!(target: "particles", shape = ?shape.shape_type, "Emit shape not implemented, using defaults");
            EmitShape::default()
        }
    }
}

/// `[min, max)` 上的均匀采样；`min >= max` 时退化为 `min`
#[inline]
fn random_range<R: Rng + ?Sized>(rng: &mut R, min: f32, max: f32) -> f32 {
    min + (max - min) * rng.gen::<f32>()
}

/// 拒绝采样一个非零方向并归一化
fn random_direction<R: Rng + ?Sized>(rng: &mut R, z_min: f32, planar: bool) -> Vec3 {
    loop {
        let x = random_range(rng, -0.5, 0.5);
        let y = random_range(rng, -0.5, 0.5);
        let z = if planar { 0.0 } else { random_range(rng, z_min, 0.5) };
        if let Some(dir) = Vec3::new(x, y, z).try_normalize() {
            return dir;
        }
    }
}

#[inline]
fn blend_direction(direction: Vec3, target: Vec3, amount: f32) -> Vec3 {
    direction
        .lerp(target, amount)
        .try_normalize()
        .unwrap_or(direction)
}

fn apply_random_direction<R: Rng + ?Sized>(
    shape: &ShapeModule,
    rng: &mut R,
    direction: Vec3,
    planar: bool,
) -> Vec3 {
    if shape.random_direction_amount > 0.0 {
        let target = random_direction(rng, -0.5, planar);
        blend_direction(direction, target, shape.random_direction_amount)
    } else {
        direction
    }
}

fn apply_spherical_direction(shape: &ShapeModule, position: Vec3, direction: Vec3) -> Vec3 {
    if shape.spherical_direction_amount > 0.0 {
        if let Some(target) = position.try_normalize() {
            return blend_direction(direction, target, shape.spherical_direction_amount);
        }
    }
    direction
}

fn emit_sphere<R: Rng + ?Sized>(shape: &ShapeModule, rng: &mut R, hemisphere: bool) -> EmitShape {
    let z_min = if hemisphere { 0.0 } else { -0.5 };
    let dir = random_direction(rng, z_min, false);
    let radius = random_range(rng, shape.radius * (1.0 - shape.radius_thickness), shape.radius);

    EmitShape {
        position: dir * radius,
        direction: apply_random_direction(shape, rng, dir, false),
    }
}

fn emit_cone<R: Rng + ?Sized>(shape: &ShapeModule, rng: &mut R) -> EmitShape {
    let angle = shape.angle.clamp(1.0, 89.0).to_radians();
    let tan = angle.tan();
    let apex_distance = shape.radius / tan;
    let apex = Vec3::new(0.0, 0.0, -apex_distance);
    let (sin, cos) = random_range(rng, 0.0, shape.arc).to_radians().sin_cos();

    let (z, radius) = match shape.shape_type {
        ShapeType::ConeVolume => {
            let z = random_range(rng, 0.0, shape.length);
            // 截面半径随离顶点的距离线性增长
            let outer = tan * (apex_distance.abs() + z);
            (z, random_range(rng, outer * (1.0 - shape.radius_thickness), outer))
        }
        _ => (
            0.0,
            random_range(rng, shape.radius * (1.0 - shape.radius_thickness), shape.radius),
        ),
    };

    let position = Vec3::new(radius * cos, radius * sin, z);
    let mut direction = (position - apex).try_normalize().unwrap_or(Vec3::Z);

    if shape.random_direction_amount > 0.0 {
        let r = random_range(rng, 0.0, shape.radius);
        let target = Vec3::new(r * cos, r * sin, 0.0) - apex;
        if let Some(target) = target.try_normalize() {
            direction = blend_direction(direction, target, shape.random_direction_amount);
        }
    }

    EmitShape {
        position,
        direction: apply_spherical_direction(shape, position, direction),
    }
}

fn emit_box<R: Rng + ?Sized>(shape: &ShapeModule, rng: &mut R) -> EmitShape {
    let half = shape.scale * 0.5;
    let x = random_range(rng, -0.5, 0.5) * shape.scale.x;
    let y = random_range(rng, -0.5, 0.5) * shape.scale.y;
    let z = random_range(rng, -0.5, 0.5) * shape.scale.z;

    let position = match shape.shape_type {
        ShapeType::BoxShell => match rng.gen_range(0..6) {
            0 => Vec3::new(-half.x, y, z),
            1 => Vec3::new(half.x, y, z),
            2 => Vec3::new(x, -half.y, z),
            3 => Vec3::new(x, half.y, z),
            4 => Vec3::new(x, y, -half.z),
            _ => Vec3::new(x, y, half.z),
        },
        ShapeType::BoxEdge => match rng.gen_range(0..12) {
            0 => Vec3::new(-half.x, -half.y, z),
            1 => Vec3::new(-half.x, half.y, z),
            2 => Vec3::new(half.x, -half.y, z),
            3 => Vec3::new(half.x, half.y, z),
            4 => Vec3::new(x, -half.y, -half.z),
            5 => Vec3::new(x, -half.y, half.z),
            6 => Vec3::new(x, half.y, -half.z),
            7 => Vec3::new(x, half.y, half.z),
            8 => Vec3::new(-half.x, y, -half.z),
            9 => Vec3::new(-half.x, y, half.z),
            10 => Vec3::new(half.x, y, -half.z),
            _ => Vec3::new(half.x, y, half.z),
        },
        _ => Vec3::new(x, y, z),
    };

    // 盒子不设置基础方向，沿用默认的 +Z
    let direction = apply_random_direction(shape, rng, Vec3::Z, false);

    EmitShape {
        position,
        direction: apply_spherical_direction(shape, position, direction),
    }
}

fn emit_circle<R: Rng + ?Sized>(shape: &ShapeModule, rng: &mut R) -> EmitShape {
    let (sin, cos) = random_range(rng, 0.0, shape.arc).to_radians().sin_cos();
    let radius = random_range(rng, shape.radius * (1.0 - shape.radius_thickness), shape.radius);

    let position = Vec3::new(radius * cos, radius * sin, 0.0);
    let direction = position.try_normalize().unwrap_or(Vec3::X);

    EmitShape {
        position,
        direction: apply_random_direction(shape, rng, direction, true),
    }
}

fn emit_edge<R: Rng + ?Sized>(shape: &ShapeModule, rng: &mut R) -> EmitShape {
    let position = Vec3::new(random_range(rng, -1.0, 1.0) * shape.radius, 0.0, 0.0);
    let direction = apply_random_direction(shape, rng, Vec3::Y, false);

    EmitShape {
        position,
        direction: apply_spherical_direction(shape, position, direction),
    }
}
