use glam::{Vec3, Vec4};

use super::curve::LERP_UNSET;
use crate::impl_default;

/// 每个随机调制字段对应的混合因子缓存
///
/// `-1` 表示尚未抽取；首次需要时抽取，之后在粒子整个生命周期内保持不变，
/// 保证 min/max 配对在视觉上连贯。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleLerps {
    pub velocity_x: f32,
    pub velocity_y: f32,
    pub velocity_z: f32,
    pub force_x: f32,
    pub force_y: f32,
    pub force_z: f32,
    pub gravity_modifier: f32,
    pub limit: f32,
    pub limit_x: f32,
    pub limit_y: f32,
    pub limit_z: f32,
    pub inherit_velocity: f32,
    pub rotation_over_lifetime_x: f32,
    pub rotation_over_lifetime_y: f32,
    pub rotation_over_lifetime_z: f32,
    pub rotation_by_speed_x: f32,
    pub rotation_by_speed_y: f32,
    pub rotation_by_speed_z: f32,
    pub color_over_lifetime: f32,
    pub color_by_speed: f32,
    pub size_over_lifetime: f32,
    pub size_over_lifetime_x: f32,
    pub size_over_lifetime_y: f32,
    pub size_over_lifetime_z: f32,
    pub size_by_speed: f32,
    pub size_by_speed_x: f32,
    pub size_by_speed_y: f32,
    pub size_by_speed_z: f32,
    pub start_frame: f32,
    pub frame_over_time: f32,
}

impl_default!(ParticleLerps {
    velocity_x: LERP_UNSET,
    velocity_y: LERP_UNSET,
    velocity_z: LERP_UNSET,
    force_x: LERP_UNSET,
    force_y: LERP_UNSET,
    force_z: LERP_UNSET,
    gravity_modifier: LERP_UNSET,
    limit: LERP_UNSET,
    limit_x: LERP_UNSET,
    limit_y: LERP_UNSET,
    limit_z: LERP_UNSET,
    inherit_velocity: LERP_UNSET,
    rotation_over_lifetime_x: LERP_UNSET,
    rotation_over_lifetime_y: LERP_UNSET,
    rotation_over_lifetime_z: LERP_UNSET,
    rotation_by_speed_x: LERP_UNSET,
    rotation_by_speed_y: LERP_UNSET,
    rotation_by_speed_z: LERP_UNSET,
    color_over_lifetime: LERP_UNSET,
    color_by_speed: LERP_UNSET,
    size_over_lifetime: LERP_UNSET,
    size_over_lifetime_x: LERP_UNSET,
    size_over_lifetime_y: LERP_UNSET,
    size_over_lifetime_z: LERP_UNSET,
    size_by_speed: LERP_UNSET,
    size_by_speed_x: LERP_UNSET,
    size_by_speed_y: LERP_UNSET,
    size_by_speed_z: LERP_UNSET,
    start_frame: LERP_UNSET,
    frame_over_time: LERP_UNSET,
});

/// 单个粒子
///
/// 位置和速度所在的空间由粒子系统的模拟空间决定，发射时固定。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    /// 发射时刻（秒，含帧内偏移）
    pub emit_time: f32,
    pub start_lifetime: f32,
    /// 剩余寿命；`<= 0` 的粒子在当帧被移除
    pub remaining_lifetime: f32,
    pub position: Vec3,
    pub velocity: Vec3,
    pub start_velocity: Vec3,
    /// 作用力与重力的累积速度
    pub force_velocity: Vec3,
    pub angular_velocity: Vec3,
    /// 欧拉角（弧度）
    pub rotation: Vec3,
    pub start_color: Vec4,
    pub color: Vec4,
    pub start_size: Vec3,
    pub size: Vec3,
    /// (scale.x, scale.y, offset.x, offset.y)
    pub uv_scale_offset: Vec4,
    pub texture_sheet_animation_row: u32,
    pub lerps: ParticleLerps,
}

impl Default for Particle {
    fn default() -> Self {
        Self {
            emit_time: 0.0,
            start_lifetime: 0.0,
            remaining_lifetime: 0.0,
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            start_velocity: Vec3::ZERO,
            force_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            rotation: Vec3::ZERO,
            start_color: Vec4::ONE,
            color: Vec4::ONE,
            start_size: Vec3::ONE,
            size: Vec3::ONE,
            uv_scale_offset: Vec4::new(1.0, 1.0, 0.0, 0.0),
            texture_sheet_animation_row: 0,
            lerps: ParticleLerps::default(),
        }
    }
}

impl Particle {
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.remaining_lifetime > 0.0
    }

    /// 归一化的已存活比例 [0, 1]
    #[inline]
    pub fn lifetime_t(&self) -> f32 {
        if self.start_lifetime <= 0.0 {
            return 1.0;
        }
        ((self.start_lifetime - self.remaining_lifetime) / self.start_lifetime).clamp(0.0, 1.0)
    }
}
