//! 粒子系统配置模块
//!
//! 所有配置都是只读的作者数据，可以在多个粒子系统实例间共享或克隆。
//! 运行时状态（爆发计数、发射时钟）放在 [`EmissionState`](super::emission::EmissionState) 中。

use std::sync::Arc;

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use super::curve::{AnimationCurve, MinMaxCurve, MinMaxGradient};
use crate::config::{ConfigError, ConfigResult};
use crate::core::error::{ParticleError, ParticleResult, MAX_VERTEX_COUNT};
use crate::impl_default;
use crate::render::mesh::ParticleMesh;

// ============================================================================
// 枚举
// ============================================================================

/// 粒子所在的坐标空间
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulationSpace {
    #[default]
    Local,
    World,
}

/// 变换缩放对粒子的影响方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalingMode {
    /// 使用世界缩放（含父节点）
    Hierarchy,
    /// 只使用自身的局部缩放
    #[default]
    Local,
    /// 只缩放发射形状
    Shape,
}

/// 发射形状
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShapeType {
    Sphere,
    Hemisphere,
    #[default]
    Cone,
    ConeVolume,
    Box,
    BoxShell,
    BoxEdge,
    Circle,
    /// 单侧边缘（X 轴上的线段，朝 +Y 发射）
    Edge,
    /// 网格表面发射（未实现，发射时使用默认位置与方向）
    Mesh,
}

/// 继承发射器速度的方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InheritVelocityMode {
    /// 只在发射时继承一次
    #[default]
    Initial,
    /// 每帧叠加发射器当前速度
    Current,
}

/// 序列帧动画方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnimationType {
    #[default]
    WholeSheet,
    SingleRow,
}

/// 渲染模式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenderMode {
    #[default]
    Billboard,
    Stretch,
    HorizontalBillboard,
    VerticalBillboard,
    Mesh,
}

// ============================================================================
// 主模块
// ============================================================================

/// 主模块：持续时间、循环和各项初始值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MainModule {
    /// 一次播放的时长（秒）
    pub duration: f32,
    pub looping: bool,
    pub start_delay: MinMaxCurve,
    pub start_lifetime: MinMaxCurve,
    pub start_speed: MinMaxCurve,
    pub start_size_3d: bool,
    pub start_size: MinMaxCurve,
    pub start_size_x: MinMaxCurve,
    pub start_size_y: MinMaxCurve,
    pub start_size_z: MinMaxCurve,
    pub start_rotation_3d: bool,
    /// 初始旋转（弧度）
    pub start_rotation: MinMaxCurve,
    pub start_rotation_x: MinMaxCurve,
    pub start_rotation_y: MinMaxCurve,
    pub start_rotation_z: MinMaxCurve,
    pub start_color: MinMaxGradient,
    /// 重力倍率（基准重力 -10）
    pub gravity_modifier: MinMaxCurve,
    pub simulation_space: SimulationSpace,
    pub simulation_speed: f32,
    pub scaling_mode: ScalingMode,
    pub max_particles: u32,
}

impl_default!(MainModule {
    duration: 5.0,
    looping: true,
    start_delay: MinMaxCurve::constant(0.0),
    start_lifetime: MinMaxCurve::constant(5.0),
    start_speed: MinMaxCurve::constant(5.0),
    start_size_3d: false,
    start_size: MinMaxCurve::constant(1.0),
    start_size_x: MinMaxCurve::constant(1.0),
    start_size_y: MinMaxCurve::constant(1.0),
    start_size_z: MinMaxCurve::constant(1.0),
    start_rotation_3d: false,
    start_rotation: MinMaxCurve::constant(0.0),
    start_rotation_x: MinMaxCurve::constant(0.0),
    start_rotation_y: MinMaxCurve::constant(0.0),
    start_rotation_z: MinMaxCurve::constant(0.0),
    start_color: MinMaxGradient::default(),
    gravity_modifier: MinMaxCurve::constant(0.0),
    simulation_space: SimulationSpace::Local,
    simulation_speed: 1.0,
    scaling_mode: ScalingMode::Local,
    max_particles: 1000,
});

// ============================================================================
// 发射模块
// ============================================================================

/// 爆发发射配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Burst {
    /// 相对播放开始的触发时间（秒）
    pub time: f32,
    pub min_count: u32,
    pub max_count: u32,
    /// 触发次数上限；`<= 0` 表示无限
    pub cycle_count: i32,
    /// 两次触发的最小间隔（秒）
    pub repeat_interval: f32,
}

impl_default!(Burst {
    time: 0.0,
    min_count: 30,
    max_count: 30,
    cycle_count: 1,
    repeat_interval: 0.01,
});

impl Burst {
    pub fn new(time: f32, count: u32) -> Self {
        Self {
            time,
            min_count: count,
            max_count: count,
            ..Default::default()
        }
    }

    pub fn with_cycles(mut self, cycle_count: i32, repeat_interval: f32) -> Self {
        self.cycle_count = cycle_count;
        self.repeat_interval = repeat_interval;
        self
    }
}

/// 发射模块
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmissionModule {
    pub enabled: bool,
    /// 每秒发射数量
    pub rate_over_time: MinMaxCurve,
    pub bursts: Vec<Burst>,
}

impl_default!(EmissionModule {
    enabled: true,
    rate_over_time: MinMaxCurve::constant(10.0),
    bursts: Vec::new(),
});

// ============================================================================
// 形状模块
// ============================================================================

/// 发射形状模块
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeModule {
    pub enabled: bool,
    pub shape_type: ShapeType,
    /// 圆锥半角（度）
    pub angle: f32,
    pub radius: f32,
    /// 0 表示只在表面发射，1 表示整个体积
    pub radius_thickness: f32,
    /// 弧度范围（度）
    pub arc: f32,
    /// 圆锥体积的长度
    pub length: f32,
    /// 盒子的完整尺寸
    pub scale: Vec3,
    pub random_direction_amount: f32,
    pub spherical_direction_amount: f32,
}

impl_default!(ShapeModule {
    enabled: true,
    shape_type: ShapeType::Cone,
    angle: 25.0,
    radius: 1.0,
    radius_thickness: 1.0,
    arc: 360.0,
    length: 5.0,
    scale: Vec3::ONE,
    random_direction_amount: 0.0,
    spherical_direction_amount: 0.0,
});

// ============================================================================
// 调制模块
// ============================================================================

/// 生命周期速度
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VelocityOverLifetimeModule {
    pub enabled: bool,
    pub x: MinMaxCurve,
    pub y: MinMaxCurve,
    pub z: MinMaxCurve,
    pub space: SimulationSpace,
}

/// 生命周期速度限制
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitVelocityOverLifetimeModule {
    pub enabled: bool,
    pub separate_axes: bool,
    pub limit: MinMaxCurve,
    pub limit_x: MinMaxCurve,
    pub limit_y: MinMaxCurve,
    pub limit_z: MinMaxCurve,
    /// 超出部分的衰减比例（0 保留全部超出，1 硬截断）
    pub dampen: f32,
    pub space: SimulationSpace,
}

impl_default!(LimitVelocityOverLifetimeModule {
    enabled: false,
    separate_axes: false,
    limit: MinMaxCurve::constant(1.0),
    limit_x: MinMaxCurve::constant(1.0),
    limit_y: MinMaxCurve::constant(1.0),
    limit_z: MinMaxCurve::constant(1.0),
    dampen: 1.0,
    space: SimulationSpace::Local,
});

/// 继承发射器速度
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InheritVelocityModule {
    pub enabled: bool,
    pub mode: InheritVelocityMode,
    pub curve: MinMaxCurve,
}

impl_default!(InheritVelocityModule {
    enabled: false,
    mode: InheritVelocityMode::Initial,
    curve: MinMaxCurve::constant(1.0),
});

/// 生命周期作用力
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForceOverLifetimeModule {
    pub enabled: bool,
    pub x: MinMaxCurve,
    pub y: MinMaxCurve,
    pub z: MinMaxCurve,
    pub space: SimulationSpace,
}

/// 生命周期颜色
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorOverLifetimeModule {
    pub enabled: bool,
    pub color: MinMaxGradient,
}

/// 按速度着色
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorBySpeedModule {
    pub enabled: bool,
    pub color: MinMaxGradient,
    /// 速度映射区间 (min, max)
    pub range: Vec2,
}

impl_default!(ColorBySpeedModule {
    enabled: false,
    color: MinMaxGradient::default(),
    range: Vec2::new(0.0, 1.0),
});

/// 生命周期大小
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizeOverLifetimeModule {
    pub enabled: bool,
    pub separate_axes: bool,
    pub size: MinMaxCurve,
    pub x: MinMaxCurve,
    pub y: MinMaxCurve,
    pub z: MinMaxCurve,
}

impl_default!(SizeOverLifetimeModule {
    enabled: false,
    separate_axes: false,
    size: MinMaxCurve::curve(AnimationCurve::linear(0.0, 1.0, 1.0, 0.0), 1.0),
    x: MinMaxCurve::constant(1.0),
    y: MinMaxCurve::constant(1.0),
    z: MinMaxCurve::constant(1.0),
});

/// 按速度缩放
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizeBySpeedModule {
    pub enabled: bool,
    pub separate_axes: bool,
    pub size: MinMaxCurve,
    pub x: MinMaxCurve,
    pub y: MinMaxCurve,
    pub z: MinMaxCurve,
    pub range: Vec2,
}

impl_default!(SizeBySpeedModule {
    enabled: false,
    separate_axes: false,
    size: MinMaxCurve::constant(1.0),
    x: MinMaxCurve::constant(1.0),
    y: MinMaxCurve::constant(1.0),
    z: MinMaxCurve::constant(1.0),
    range: Vec2::new(0.0, 1.0),
});

/// 生命周期角速度（弧度/秒）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationOverLifetimeModule {
    pub enabled: bool,
    pub separate_axes: bool,
    pub x: MinMaxCurve,
    pub y: MinMaxCurve,
    pub z: MinMaxCurve,
}

/// 按速度旋转
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationBySpeedModule {
    pub enabled: bool,
    pub separate_axes: bool,
    pub x: MinMaxCurve,
    pub y: MinMaxCurve,
    pub z: MinMaxCurve,
    pub range: Vec2,
}

impl_default!(RotationBySpeedModule {
    enabled: false,
    separate_axes: false,
    x: MinMaxCurve::constant(0.0),
    y: MinMaxCurve::constant(0.0),
    z: MinMaxCurve::constant(0.0),
    range: Vec2::new(0.0, 1.0),
});

/// 外部作用力（风场等），力本身由宿主通过 `set_external_force` 提供
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalForcesModule {
    pub enabled: bool,
    pub multiplier: f32,
}

impl_default!(ExternalForcesModule {
    enabled: false,
    multiplier: 1.0,
});

/// 序列帧动画
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureSheetAnimationModule {
    pub enabled: bool,
    pub num_tiles_x: u32,
    pub num_tiles_y: u32,
    pub animation: AnimationType,
    pub use_random_row: bool,
    pub row_index: u32,
    /// 起始帧（占总帧数的比例）
    pub start_frame: MinMaxCurve,
    /// 随生命周期推进的帧（占总帧数的比例）
    pub frame_over_time: MinMaxCurve,
}

impl_default!(TextureSheetAnimationModule {
    enabled: false,
    num_tiles_x: 1,
    num_tiles_y: 1,
    animation: AnimationType::WholeSheet,
    use_random_row: true,
    row_index: 0,
    start_frame: MinMaxCurve::constant(0.0),
    frame_over_time: MinMaxCurve::curve(AnimationCurve::linear(0.0, 0.0, 1.0, 1.0), 1.0),
});

/// 全部调制模块
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleModules {
    pub velocity_over_lifetime: VelocityOverLifetimeModule,
    pub limit_velocity_over_lifetime: LimitVelocityOverLifetimeModule,
    pub inherit_velocity: InheritVelocityModule,
    pub force_over_lifetime: ForceOverLifetimeModule,
    pub color_over_lifetime: ColorOverLifetimeModule,
    pub color_by_speed: ColorBySpeedModule,
    pub size_over_lifetime: SizeOverLifetimeModule,
    pub size_by_speed: SizeBySpeedModule,
    pub rotation_over_lifetime: RotationOverLifetimeModule,
    pub rotation_by_speed: RotationBySpeedModule,
    pub external_forces: ExternalForcesModule,
    pub texture_sheet_animation: TextureSheetAnimationModule,
}

// ============================================================================
// 系统配置
// ============================================================================

/// 一个粒子效果的完整配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleSystemConfig {
    pub main: MainModule,
    pub emission: EmissionModule,
    pub shape: ShapeModule,
    pub modules: ParticleModules,
}

/// 四边形模式下允许的最大粒子数
pub const MAX_QUAD_PARTICLES: u32 = ((MAX_VERTEX_COUNT - 1) / 4) as u32;

impl ParticleSystemConfig {
    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        let main = &self.main;
        if !(main.duration >= 0.0) {
            return Err(invalid("main.duration must not be negative"));
        }
        if !(main.simulation_speed >= 0.0) {
            return Err(invalid("main.simulation_speed must not be negative"));
        }
        if main.max_particles > MAX_QUAD_PARTICLES {
            return Err(ConfigError::ValidationError(format!(
                "main.max_particles {} exceeds the 16-bit vertex budget ({})",
                main.max_particles, MAX_QUAD_PARTICLES
            )));
        }

        for (i, burst) in self.emission.bursts.iter().enumerate() {
            if burst.min_count > burst.max_count {
                return Err(ConfigError::ValidationError(format!(
                    "emission.bursts[{}]: min_count > max_count",
                    i
                )));
            }
            if burst.repeat_interval < 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "emission.bursts[{}]: repeat_interval must not be negative",
                    i
                )));
            }
        }

        let modules = &self.modules;
        let sheet = &modules.texture_sheet_animation;
        if sheet.num_tiles_x == 0 || sheet.num_tiles_y == 0 {
            return Err(invalid("texture_sheet_animation tile counts must be at least 1"));
        }

        check_range("color_by_speed.range", modules.color_by_speed.range)?;
        check_range("size_by_speed.range", modules.size_by_speed.range)?;
        check_range("rotation_by_speed.range", modules.rotation_by_speed.range)?;
        Ok(())
    }
}

fn invalid(msg: &str) -> ConfigError {
    ConfigError::ValidationError(msg.to_string())
}

fn check_range(name: &str, range: Vec2) -> ConfigResult<()> {
    if range.y <= range.x {
        return Err(ConfigError::ValidationError(format!(
            "{} must satisfy min < max, got ({}, {})",
            name, range.x, range.y
        )));
    }
    Ok(())
}

// ============================================================================
// 渲染器
// ============================================================================

/// 粒子渲染器配置
///
/// 没有渲染器的粒子系统不会更新。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleSystemRenderer {
    pub render_mode: RenderMode,
    /// Stretch 模式下尺寸对长度的贡献
    pub length_scale: f32,
    /// Stretch 模式下速度对长度的贡献
    pub velocity_scale: f32,
    /// 材质名（不透明的外部资源键）
    pub material: String,
    /// Mesh 模式使用的网格
    #[serde(skip)]
    pub mesh: Option<Arc<ParticleMesh>>,
}

impl_default!(ParticleSystemRenderer {
    render_mode: RenderMode::Billboard,
    length_scale: 2.0,
    velocity_scale: 0.0,
    material: String::from("Particles/Additive"),
    mesh: None,
});

impl ParticleSystemRenderer {
    pub fn new(render_mode: RenderMode) -> Self {
        Self {
            render_mode,
            ..Default::default()
        }
    }

    pub fn with_mesh(mesh: Arc<ParticleMesh>) -> Self {
        Self {
            render_mode: RenderMode::Mesh,
            mesh: Some(mesh),
            ..Default::default()
        }
    }

    /// Mesh 模式下检查网格存在且索引有效；其他模式总是有效
    pub fn validate(&self) -> ParticleResult<()> {
        if self.render_mode != RenderMode::Mesh {
            return Ok(());
        }
        match self.mesh.as_deref() {
            Some(mesh) if mesh.vertex_count() > 0 => mesh.validate(),
            _ => Err(ParticleError::MissingMesh),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ParticleSystemConfig::default().validate().is_ok());
    }

    #[test]
    fn test_disabled_modules_by_default() {
        let modules = ParticleModules::default();
        assert!(!modules.velocity_over_lifetime.enabled);
        assert!(!modules.limit_velocity_over_lifetime.enabled);
        assert!(!modules.texture_sheet_animation.enabled);
        assert!(!modules.external_forces.enabled);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ParticleSystemConfig::default();
        config.modules.texture_sheet_animation.num_tiles_x = 0;
        assert!(config.validate().is_err());

        let mut config = ParticleSystemConfig::default();
        config.modules.size_by_speed.range = Vec2::new(2.0, 1.0);
        assert!(config.validate().is_err());

        let mut config = ParticleSystemConfig::default();
        config.main.max_particles = MAX_QUAD_PARTICLES + 1;
        assert!(config.validate().is_err());

        let mut config = ParticleSystemConfig::default();
        config.emission.bursts.push(Burst {
            min_count: 5,
            max_count: 2,
            ..Default::default()
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_burst_builder() {
        let burst = Burst::new(0.5, 12).with_cycles(3, 0.25);
        assert_eq!(burst.min_count, 12);
        assert_eq!(burst.max_count, 12);
        assert_eq!(burst.cycle_count, 3);
        assert_eq!(burst.repeat_interval, 0.25);
    }

    #[test]
    fn test_renderer_mesh_is_not_serialized() {
        let renderer = ParticleSystemRenderer::with_mesh(Arc::new(ParticleMesh::quad()));
        let json = serde_json::to_string(&renderer).unwrap();
        assert!(!json.contains("mesh\""));
        let parsed: ParticleSystemRenderer = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.render_mode, RenderMode::Mesh);
        assert!(parsed.mesh.is_none());
    }

    #[test]
    fn test_renderer_validation() {
        assert!(ParticleSystemRenderer::default().validate().is_ok());
        assert!(ParticleSystemRenderer::with_mesh(Arc::new(ParticleMesh::cube()))
            .validate()
            .is_ok());
        assert!(matches!(
            ParticleSystemRenderer::new(RenderMode::Mesh).validate(),
            Err(ParticleError::MissingMesh)
        ));

        let mut mesh = ParticleMesh::quad();
        mesh.triangles.push(200);
        assert!(matches!(
            ParticleSystemRenderer::with_mesh(Arc::new(mesh)).validate(),
            Err(ParticleError::InvalidMeshIndex { index: 200, .. })
        ));
    }

    #[test]
    fn test_partial_json() {
        let config: ParticleSystemConfig =
            serde_json::from_str(r#"{"main":{"duration":1.5},"shape":{"shape_type":"Sphere"}}"#)
                .unwrap();
        assert_eq!(config.main.duration, 1.5);
        assert!(config.main.looping);
        assert_eq!(config.shape.shape_type, ShapeType::Sphere);
        assert_eq!(config.shape.radius, 1.0);
    }
}
