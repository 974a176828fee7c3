use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

use super::curve::{AnimationCurve, Gradient, MinMaxCurve, MinMaxGradient};
use super::modules::{
    Burst, EmissionModule, MainModule, ParticleModules, ParticleSystemConfig,
    ParticleSystemRenderer, RenderMode, ShapeModule, ShapeType, SimulationSpace,
};

/// 粒子系统预设
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticlePreset {
    Fire,
    Smoke,
    Explosion,
    Rain,
    Snow,
    Magic,
}

impl ParticlePreset {
    pub const ALL: [ParticlePreset; 6] = [
        ParticlePreset::Fire,
        ParticlePreset::Smoke,
        ParticlePreset::Explosion,
        ParticlePreset::Rain,
        ParticlePreset::Snow,
        ParticlePreset::Magic,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ParticlePreset::Fire => "Fire",
            ParticlePreset::Smoke => "Smoke",
            ParticlePreset::Explosion => "Explosion",
            ParticlePreset::Rain => "Rain",
            ParticlePreset::Snow => "Snow",
            ParticlePreset::Magic => "Magic",
        }
    }

    /// 按名称查找（不区分大小写）
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|preset| preset.name().eq_ignore_ascii_case(name))
    }

    /// 预设适合的渲染器
    pub fn renderer(&self) -> ParticleSystemRenderer {
        match self {
            ParticlePreset::Rain => ParticleSystemRenderer {
                render_mode: RenderMode::Stretch,
                length_scale: 1.0,
                velocity_scale: 0.05,
                ..Default::default()
            },
            _ => ParticleSystemRenderer::default(),
        }
    }

    pub fn to_config(&self) -> ParticleSystemConfig {
        match self {
            ParticlePreset::Fire => {
                let mut config = base(50.0, 500, true);
                config.main.start_lifetime = MinMaxCurve::two_constants(0.7, 1.3);
                config.main.start_speed = MinMaxCurve::constant(0.5);
                config.main.start_size = MinMaxCurve::two_constants(0.3, 0.7);
                config.main.gravity_modifier = MinMaxCurve::constant(-0.1);
                config.shape = ShapeModule {
                    shape_type: ShapeType::Cone,
                    angle: 15.0,
                    radius: 0.2,
                    ..Default::default()
                };
                rise(&mut config.modules, 2.0);
                fade(
                    &mut config.modules,
                    Vec4::new(1.0, 0.5, 0.0, 1.0),
                    Vec4::new(1.0, 0.0, 0.0, 0.0),
                );
                shrink(&mut config.modules, 1.0, 0.0);
                config
            }
            ParticlePreset::Smoke => {
                let mut config = base(20.0, 300, true);
                config.main.start_lifetime = MinMaxCurve::two_constants(2.5, 3.5);
                config.main.start_speed = MinMaxCurve::constant(0.3);
                config.main.start_size = MinMaxCurve::two_constants(0.3, 0.7);
                config.main.gravity_modifier = MinMaxCurve::constant(-0.05);
                config.shape = ShapeModule {
                    shape_type: ShapeType::Cone,
                    angle: 10.0,
                    radius: 0.3,
                    ..Default::default()
                };
                rise(&mut config.modules, 1.0);
                fade(
                    &mut config.modules,
                    Vec4::new(0.5, 0.5, 0.5, 0.8),
                    Vec4::new(0.3, 0.3, 0.3, 0.0),
                );
                shrink(&mut config.modules, 1.0, 4.0);
                config
            }
            ParticlePreset::Explosion => {
                let mut config = base(0.0, 1000, false);
                config.main.duration = 1.0;
                config.main.start_lifetime = MinMaxCurve::two_constants(0.3, 0.7);
                config.main.start_speed = MinMaxCurve::two_constants(3.0, 7.0);
                config.main.start_size = MinMaxCurve::two_constants(0.5, 1.5);
                config.main.gravity_modifier = MinMaxCurve::constant(0.5);
                config.emission.bursts.push(Burst::new(0.0, 200));
                config.shape = ShapeModule {
                    shape_type: ShapeType::Sphere,
                    radius: 0.5,
                    ..Default::default()
                };
                let limit = &mut config.modules.limit_velocity_over_lifetime;
                limit.enabled = true;
                limit.limit = MinMaxCurve::constant(0.0);
                limit.dampen = 0.2;
                fade(
                    &mut config.modules,
                    Vec4::new(1.0, 0.8, 0.0, 1.0),
                    Vec4::new(0.5, 0.0, 0.0, 0.0),
                );
                shrink(&mut config.modules, 1.0, 0.0);
                config
            }
            ParticlePreset::Rain => {
                let mut config = base(100.0, 1000, true);
                config.main.start_lifetime = MinMaxCurve::two_constants(1.7, 2.3);
                config.main.start_speed = MinMaxCurve::constant(0.0);
                config.main.start_size = MinMaxCurve::two_constants(0.05, 0.15);
                config.main.start_color = MinMaxGradient::color(Vec4::new(0.5, 0.5, 1.0, 0.8));
                config.main.gravity_modifier = MinMaxCurve::constant(0.98);
                config.main.simulation_space = SimulationSpace::World;
                config.shape = ShapeModule {
                    shape_type: ShapeType::Box,
                    scale: Vec3::new(10.0, 0.1, 10.0),
                    ..Default::default()
                };
                rise(&mut config.modules, -10.0);
                config
            }
            ParticlePreset::Snow => {
                let mut config = base(50.0, 500, true);
                config.main.start_lifetime = MinMaxCurve::two_constants(4.0, 6.0);
                config.main.start_speed = MinMaxCurve::constant(0.0);
                config.main.start_size = MinMaxCurve::two_constants(0.1, 0.3);
                config.main.start_rotation = MinMaxCurve::two_constants(0.0, std::f32::consts::TAU);
                config.main.gravity_modifier = MinMaxCurve::constant(0.1);
                config.main.simulation_space = SimulationSpace::World;
                config.shape = ShapeModule {
                    shape_type: ShapeType::Box,
                    scale: Vec3::new(10.0, 0.1, 10.0),
                    random_direction_amount: 0.5,
                    ..Default::default()
                };
                rise(&mut config.modules, -1.0);
                let spin = &mut config.modules.rotation_over_lifetime;
                spin.enabled = true;
                spin.z = MinMaxCurve::two_constants(-1.0, 1.0);
                fade(
                    &mut config.modules,
                    Vec4::ONE,
                    Vec4::new(1.0, 1.0, 1.0, 0.8),
                );
                config
            }
            ParticlePreset::Magic => {
                let mut config = base(30.0, 300, true);
                config.main.start_lifetime = MinMaxCurve::two_constants(1.0, 2.0);
                config.main.start_speed = MinMaxCurve::two_constants(0.0, 2.0);
                config.main.start_size = MinMaxCurve::two_constants(0.2, 0.4);
                config.main.start_color = MinMaxGradient::two_colors(
                    Vec4::new(0.5, 0.0, 1.0, 1.0),
                    Vec4::new(0.0, 1.0, 1.0, 1.0),
                );
                config.shape = ShapeModule {
                    shape_type: ShapeType::Sphere,
                    radius: 1.0,
                    radius_thickness: 0.0,
                    ..Default::default()
                };
                fade(&mut config.modules, Vec4::ONE, Vec4::new(1.0, 1.0, 1.0, 0.0));
                shrink(&mut config.modules, 1.0, 0.0);
                config
            }
        }
    }
}

fn base(rate: f32, max_particles: u32, looping: bool) -> ParticleSystemConfig {
    ParticleSystemConfig {
        main: MainModule {
            looping,
            max_particles,
            ..Default::default()
        },
        emission: EmissionModule {
            rate_over_time: MinMaxCurve::constant(rate),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// 世界空间的竖直速度
fn rise(modules: &mut ParticleModules, speed: f32) {
    let velocity = &mut modules.velocity_over_lifetime;
    velocity.enabled = true;
    velocity.space = SimulationSpace::World;
    velocity.y = MinMaxCurve::constant(speed);
}

fn fade(modules: &mut ParticleModules, start: Vec4, end: Vec4) {
    modules.color_over_lifetime.enabled = true;
    modules.color_over_lifetime.color = MinMaxGradient::gradient(Gradient::two_point(start, end));
}

fn shrink(modules: &mut ParticleModules, start: f32, end: f32) {
    modules.size_over_lifetime.enabled = true;
    modules.size_over_lifetime.separate_axes = false;
    modules.size_over_lifetime.size =
        MinMaxCurve::curve(AnimationCurve::linear(0.0, start, 1.0, end), 1.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_presets_validate() {
        for preset in ParticlePreset::ALL {
            let config = preset.to_config();
            assert!(config.validate().is_ok(), "{} failed validation", preset.name());
        }
    }

    #[test]
    fn test_preset_lookup() {
        assert_eq!(ParticlePreset::from_name("smoke"), Some(ParticlePreset::Smoke));
        assert_eq!(ParticlePreset::from_name("RAIN"), Some(ParticlePreset::Rain));
        assert_eq!(ParticlePreset::from_name("sparkles"), None);
    }

    #[test]
    fn test_preset_caps() {
        assert_eq!(ParticlePreset::Fire.to_config().main.max_particles, 500);
        assert_eq!(ParticlePreset::Smoke.to_config().main.max_particles, 300);
        assert_eq!(ParticlePreset::Explosion.to_config().main.max_particles, 1000);
    }

    #[test]
    fn test_explosion_is_single_burst() {
        let config = ParticlePreset::Explosion.to_config();
        assert!(!config.main.looping);
        assert_eq!(config.emission.bursts.len(), 1);
        assert_eq!(config.emission.rate_over_time, MinMaxCurve::constant(0.0));
    }

    #[test]
    fn test_rain_uses_stretch() {
        assert_eq!(ParticlePreset::Rain.renderer().render_mode, RenderMode::Stretch);
        assert_eq!(ParticlePreset::Fire.renderer().render_mode, RenderMode::Billboard);
    }
}
