//! CPU 粒子系统模块
//!
//! 每帧在 CPU 上发射、老化并几何化成千上万个独立粒子，结果写入 16 位索引的顶点/索引缓冲区，
//! 由 GPU 管线直接绘制。
//!
//! ## 架构设计
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    ParticleSystem                        │
//! ├─────────────────────────────────────────────────────────┤
//! │  1. Emission (emission + shape)                          │
//! │     - 播放时钟、循环、爆发                                 │
//! │     - 按形状采样初始位置和方向                             │
//! │                                                          │
//! │  2. Simulation (integrator)                              │
//! │     - 速度/作用力/重力/限速                                │
//! │     - 颜色/大小/旋转/序列帧随生命周期变化                  │
//! │                                                          │
//! │  3. Geometry (geometry)                                  │
//! │     - Billboard / Stretch / 水平 / 竖直 / Mesh            │
//! │     - 写入后端缓冲区                                      │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 使用示例
//!
//! ```ignore
//! commands.spawn((
//!     ParticleSystem::new(ParticlePreset::Fire.to_config(), Some(ParticleSystemRenderer::default())),
//!     Transform::default(),
//! ));
//! ```

pub mod curve;
pub mod emission;
pub mod geometry;
pub mod integrator;
pub mod modules;
pub mod particle;
pub mod presets;
pub mod shape;
pub mod system;

pub use curve::{
    AnimationCurve, Gradient, GradientAlphaKey, GradientColorKey, GradientMode, Keyframe,
    MinMaxCurve, MinMaxGradient,
};
pub use emission::{BurstState, EmissionState};
pub use geometry::CameraView;
pub use modules::{
    AnimationType, Burst, EmissionModule, InheritVelocityMode, MainModule, ParticleModules,
    ParticleSystemConfig, ParticleSystemRenderer, RenderMode, ScalingMode, ShapeModule, ShapeType,
    SimulationSpace,
};
pub use particle::Particle;
pub use presets::ParticlePreset;
pub use system::{
    particle_buffer_system, particle_system_update_system, ParticleSystem, ParticleSystemStats,
};
