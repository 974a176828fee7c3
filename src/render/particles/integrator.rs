//! 粒子积分
//!
//! 每个存活粒子每帧按固定顺序经过以下阶段：
//! 寿命 → 速度 → 角速度 → 颜色 → 大小 → UV → 位置 → 旋转。
//! 本帧寿命降到 0 以下的粒子仍然完整走完所有阶段，然后被移除。

use glam::{Vec2, Vec3, Vec4};
use rand::Rng;

use super::curve::MinMaxCurve;
use super::modules::{
    AnimationType, InheritVelocityMode, MainModule, ParticleModules, ScalingMode, SimulationSpace,
};
use super::particle::Particle;
use crate::ecs::SpaceTransform;

/// 基准重力加速度（沿 -Y）
pub const GRAVITY: f32 = -10.0;

/// 一次积分步骤的只读上下文
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub main: &'a MainModule,
    pub modules: &'a ParticleModules,
    pub space: &'a SpaceTransform,
    /// 当前时刻（秒）
    pub now: f32,
    /// 已乘模拟速度的步长
    pub delta_time: f32,
    /// 发射器的世界速度
    pub emitter_velocity: Vec3,
    /// 宿主设置的外部作用力（世界空间）
    pub external_force: Vec3,
}

/// 推进所有粒子并移除死亡粒子，返回移除数量
///
/// 存活粒子保持原有顺序。
pub fn step_particles<R: Rng + ?Sized>(
    particles: &mut Vec<Particle>,
    ctx: &StepContext<'_>,
    rng: &mut R,
) -> usize {
    let before = particles.len();
    particles.retain_mut(|p| {
        if p.is_alive() {
            step_particle(p, ctx, &mut *rng);
        }
        p.is_alive()
    });
    before - particles.len()
}

/// 单个粒子的完整积分
pub fn step_particle<R: Rng + ?Sized>(p: &mut Particle, ctx: &StepContext<'_>, rng: &mut R) {
    update_lifetime(p, ctx);
    update_velocity(p, ctx, rng);
    update_angular_velocity(p, ctx, rng);
    update_color(p, ctx, rng);
    update_size(p, ctx, rng);
    update_uv(p, ctx, rng);
    p.position += p.velocity * ctx.delta_time;
    p.rotation += p.angular_velocity * ctx.delta_time;
}

pub fn update_lifetime(p: &mut Particle, ctx: &StepContext<'_>) {
    p.remaining_lifetime =
        p.start_lifetime - (ctx.now - p.emit_time) * ctx.main.simulation_speed;
}

/// 归一化速度比例
#[inline]
pub fn speed_t(speed: f32, range: Vec2) -> f32 {
    let span = range.y - range.x;
    if span <= f32::EPSILON {
        return if speed >= range.y { 1.0 } else { 0.0 };
    }
    ((speed - range.x) / span).clamp(0.0, 1.0)
}

/// 把曲线空间的向量转换到粒子所在空间
#[inline]
fn to_particle_space(
    v: Vec3,
    curve_space: SimulationSpace,
    particle_space: SimulationSpace,
    space: &SpaceTransform,
) -> Vec3 {
    match (particle_space, curve_space) {
        (SimulationSpace::World, SimulationSpace::Local) => space.local_to_world.transform_vector3(v),
        (SimulationSpace::Local, SimulationSpace::World) => space.world_to_local.transform_vector3(v),
        _ => v,
    }
}

/// 跨空间转换时只改变方向，保持长度
#[inline]
fn to_particle_space_preserving(
    v: Vec3,
    curve_space: SimulationSpace,
    particle_space: SimulationSpace,
    space: &SpaceTransform,
) -> Vec3 {
    if curve_space == particle_space {
        return v;
    }
    let len = v.length();
    let moved = to_particle_space(v, curve_space, particle_space, space);
    match moved.try_normalize() {
        Some(dir) if len > 0.0 => dir * len,
        _ => moved,
    }
}

#[inline]
fn sample_xyz<R: Rng + ?Sized>(
    curves: [&MinMaxCurve; 3],
    t: f32,
    slots: [&mut f32; 3],
    rng: &mut R,
) -> Vec3 {
    let [sx, sy, sz] = slots;
    Vec3::new(
        curves[0].evaluate_cached(t, sx, rng),
        curves[1].evaluate_cached(t, sy, rng),
        curves[2].evaluate_cached(t, sz, rng),
    )
}

pub fn update_velocity<R: Rng + ?Sized>(p: &mut Particle, ctx: &StepContext<'_>, rng: &mut R) {
    let main = ctx.main;
    let modules = ctx.modules;
    let space = ctx.space;
    let particle_space = main.simulation_space;
    let scale = space.world_scale;
    let dt = ctx.delta_time;
    let t = p.lifetime_t();
    let lerps = &mut p.lerps;

    let mut v = match particle_space {
        SimulationSpace::World => p.start_velocity,
        SimulationSpace::Local => p.start_velocity * scale,
    };

    let vol = &modules.velocity_over_lifetime;
    if vol.enabled {
        let curve = sample_xyz(
            [&vol.x, &vol.y, &vol.z],
            t,
            [&mut lerps.velocity_x, &mut lerps.velocity_y, &mut lerps.velocity_z],
            rng,
        ) * scale;
        v += to_particle_space(curve, vol.space, particle_space, space);
    }

    let force = &modules.force_over_lifetime;
    if force.enabled {
        let f = sample_xyz(
            [&force.x, &force.y, &force.z],
            t,
            [&mut lerps.force_x, &mut lerps.force_y, &mut lerps.force_z],
            rng,
        ) * scale;
        p.force_velocity += to_particle_space_preserving(f, force.space, particle_space, space) * dt;
    }

    let gravity = GRAVITY
        * main
            .gravity_modifier
            .evaluate_cached(t, &mut lerps.gravity_modifier, rng);
    p.force_velocity.y += gravity * dt;

    let external = &modules.external_forces;
    if external.enabled {
        let f = to_particle_space_preserving(
            ctx.external_force * external.multiplier,
            SimulationSpace::World,
            particle_space,
            space,
        );
        p.force_velocity += f * dt;
    }

    let inherit = &modules.inherit_velocity;
    if inherit.enabled && inherit.mode == InheritVelocityMode::Current {
        let k = inherit
            .curve
            .evaluate_cached(t, &mut lerps.inherit_velocity, rng);
        v += to_particle_space(
            ctx.emitter_velocity * k,
            SimulationSpace::World,
            particle_space,
            space,
        );
    }

    v += p.force_velocity;

    let limit = &modules.limit_velocity_over_lifetime;
    if limit.enabled {
        let keep = 1.0 - limit.dampen;
        if limit.separate_axes {
            let bound = sample_xyz(
                [&limit.limit_x, &limit.limit_y, &limit.limit_z],
                t,
                [&mut lerps.limit_x, &mut lerps.limit_y, &mut lerps.limit_z],
                rng,
            ) * scale;
            let bound = to_particle_space(bound, limit.space, particle_space, space);
            for axis in 0..3 {
                if v[axis] > bound[axis] {
                    v[axis] = bound[axis] + (v[axis] - bound[axis]) * keep;
                }
            }
        } else {
            let bound = limit.limit.evaluate_cached(t, &mut lerps.limit, rng);
            let magnitude = v.length();
            if magnitude > bound {
                v = v.normalize_or_zero() * (bound + (magnitude - bound) * keep);
            }
        }
    }

    p.velocity = v;
}

pub fn update_angular_velocity<R: Rng + ?Sized>(
    p: &mut Particle,
    ctx: &StepContext<'_>,
    rng: &mut R,
) {
    let modules = ctx.modules;
    let t = p.lifetime_t();
    let lerps = &mut p.lerps;
    let mut w = Vec3::ZERO;

    let over_lifetime = &modules.rotation_over_lifetime;
    if over_lifetime.enabled {
        if over_lifetime.separate_axes {
            w += sample_xyz(
                [&over_lifetime.x, &over_lifetime.y, &over_lifetime.z],
                t,
                [
                    &mut lerps.rotation_over_lifetime_x,
                    &mut lerps.rotation_over_lifetime_y,
                    &mut lerps.rotation_over_lifetime_z,
                ],
                rng,
            );
        } else {
            w.z += over_lifetime
                .z
                .evaluate_cached(t, &mut lerps.rotation_over_lifetime_z, rng);
        }
    }

    let by_speed = &modules.rotation_by_speed;
    if by_speed.enabled {
        let st = speed_t(p.velocity.length(), by_speed.range);
        if by_speed.separate_axes {
            w += sample_xyz(
                [&by_speed.x, &by_speed.y, &by_speed.z],
                st,
                [
                    &mut lerps.rotation_by_speed_x,
                    &mut lerps.rotation_by_speed_y,
                    &mut lerps.rotation_by_speed_z,
                ],
                rng,
            );
        } else {
            w.z += by_speed
                .z
                .evaluate_cached(st, &mut lerps.rotation_by_speed_z, rng);
        }
    }

    p.angular_velocity = w;
}

pub fn update_color<R: Rng + ?Sized>(p: &mut Particle, ctx: &StepContext<'_>, rng: &mut R) {
    let modules = ctx.modules;
    let mut color: Vec4 = p.start_color;

    let over_lifetime = &modules.color_over_lifetime;
    if over_lifetime.enabled {
        color *= over_lifetime.color.evaluate_cached(
            p.lifetime_t(),
            &mut p.lerps.color_over_lifetime,
            rng,
        );
    }

    let by_speed = &modules.color_by_speed;
    if by_speed.enabled {
        let st = speed_t(p.velocity.length(), by_speed.range);
        color *= by_speed
            .color
            .evaluate_cached(st, &mut p.lerps.color_by_speed, rng);
    }

    p.color = color;
}

pub fn update_size<R: Rng + ?Sized>(p: &mut Particle, ctx: &StepContext<'_>, rng: &mut R) {
    let modules = ctx.modules;
    let t = p.lifetime_t();
    let lerps = &mut p.lerps;

    let mut size = match ctx.main.scaling_mode {
        ScalingMode::Hierarchy => p.start_size * ctx.space.world_scale,
        ScalingMode::Local => p.start_size * ctx.space.local_scale,
        ScalingMode::Shape => p.start_size,
    };

    let over_lifetime = &modules.size_over_lifetime;
    if over_lifetime.enabled {
        if over_lifetime.separate_axes {
            size *= sample_xyz(
                [&over_lifetime.x, &over_lifetime.y, &over_lifetime.z],
                t,
                [
                    &mut lerps.size_over_lifetime_x,
                    &mut lerps.size_over_lifetime_y,
                    &mut lerps.size_over_lifetime_z,
                ],
                rng,
            );
        } else {
            size *= over_lifetime
                .size
                .evaluate_cached(t, &mut lerps.size_over_lifetime, rng);
        }
    }

    let by_speed = &modules.size_by_speed;
    if by_speed.enabled {
        let st = speed_t(p.velocity.length(), by_speed.range);
        if by_speed.separate_axes {
            size *= sample_xyz(
                [&by_speed.x, &by_speed.y, &by_speed.z],
                st,
                [
                    &mut lerps.size_by_speed_x,
                    &mut lerps.size_by_speed_y,
                    &mut lerps.size_by_speed_z,
                ],
                rng,
            );
        } else {
            size *= by_speed
                .size
                .evaluate_cached(st, &mut lerps.size_by_speed, rng);
        }
    }

    p.size = size;
}

pub fn update_uv<R: Rng + ?Sized>(p: &mut Particle, ctx: &StepContext<'_>, rng: &mut R) {
    let sheet = &ctx.modules.texture_sheet_animation;
    if !sheet.enabled {
        p.uv_scale_offset = Vec4::new(1.0, 1.0, 0.0, 0.0);
        return;
    }

    let tiles_x = sheet.num_tiles_x.max(1) as i64;
    let tiles_y = sheet.num_tiles_y.max(1) as i64;
    let scale_x = 1.0 / tiles_x as f32;
    let scale_y = 1.0 / tiles_y as f32;

    let (row, span) = match sheet.animation {
        AnimationType::SingleRow => {
            let row = if sheet.use_random_row {
                p.texture_sheet_animation_row
            } else {
                sheet.row_index
            };
            (row as i64, tiles_x as f32)
        }
        AnimationType::WholeSheet => (0, (tiles_x * tiles_y) as f32),
    };

    let start_frame =
        (span * sheet.start_frame.evaluate_cached(0.0, &mut p.lerps.start_frame, rng)) as i64;
    let frame_over_time = (span
        * sheet
            .frame_over_time
            .evaluate_cached(p.lifetime_t(), &mut p.lerps.frame_over_time, rng))
        as i64;

    let frame = (row * tiles_x + start_frame + frame_over_time).rem_euclid(tiles_x * tiles_y);
    let x = frame % tiles_x;
    let y = frame / tiles_x;

    p.uv_scale_offset = Vec4::new(scale_x, scale_y, x as f32 * scale_x, y as f32 * scale_y);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::Transform;
    use crate::render::particles::curve::{AnimationCurve, Gradient, MinMaxGradient, LERP_UNSET};
    use crate::render::particles::particle::ParticleLerps;
    use glam::Quat;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn particle(lifetime: f32) -> Particle {
        Particle {
            start_lifetime: lifetime,
            remaining_lifetime: lifetime,
            ..Default::default()
        }
    }

    fn ctx<'a>(
        main: &'a MainModule,
        modules: &'a ParticleModules,
        space: &'a SpaceTransform,
        now: f32,
        dt: f32,
    ) -> StepContext<'a> {
        StepContext {
            main,
            modules,
            space,
            now,
            delta_time: dt,
            emitter_velocity: Vec3::ZERO,
            external_force: Vec3::ZERO,
        }
    }

    #[test]
    fn test_lifetime_and_position() {
        let main = MainModule::default();
        let modules = ParticleModules::default();
        let space = SpaceTransform::default();
        let mut rng = StdRng::seed_from_u64(1);

        let mut p = particle(1.0);
        p.start_velocity = Vec3::new(0.0, 0.0, 2.0);
        step_particle(&mut p, &ctx(&main, &modules, &space, 0.25, 0.25), &mut rng);

        assert!((p.remaining_lifetime - 0.75).abs() < 1e-6);
        assert!((p.position - Vec3::new(0.0, 0.0, 0.5)).length() < 1e-6);
        assert_eq!(p.uv_scale_offset, Vec4::new(1.0, 1.0, 0.0, 0.0));
    }

    #[test]
    fn test_gravity_accumulates() {
        let main = MainModule {
            gravity_modifier: MinMaxCurve::constant(1.0),
            ..Default::default()
        };
        let modules = ParticleModules::default();
        let space = SpaceTransform::default();
        let mut rng = StdRng::seed_from_u64(1);

        let mut p = particle(10.0);
        update_velocity(&mut p, &ctx(&main, &modules, &space, 0.1, 0.1), &mut rng);
        update_velocity(&mut p, &ctx(&main, &modules, &space, 0.2, 0.1), &mut rng);
        assert!((p.force_velocity.y + 2.0).abs() < 1e-5);
        assert!((p.velocity.y + 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_local_start_velocity_uses_world_scale() {
        let main = MainModule::default();
        let modules = ParticleModules::default();
        let space = SpaceTransform::from_transform(&Transform {
            scale: Vec3::splat(2.0),
            ..Default::default()
        });
        let mut rng = StdRng::seed_from_u64(1);

        let mut p = particle(1.0);
        p.start_velocity = Vec3::X;
        update_velocity(&mut p, &ctx(&main, &modules, &space, 0.0, 0.1), &mut rng);
        assert!((p.velocity - Vec3::new(2.0, 0.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_limit_dampens_excess() {
        let main = MainModule::default();
        let mut modules = ParticleModules::default();
        modules.limit_velocity_over_lifetime.enabled = true;
        modules.limit_velocity_over_lifetime.limit = MinMaxCurve::constant(2.0);
        modules.limit_velocity_over_lifetime.dampen = 0.5;
        let space = SpaceTransform::default();
        let mut rng = StdRng::seed_from_u64(1);

        let mut p = particle(1.0);
        p.start_velocity = Vec3::new(6.0, 0.0, 0.0);
        update_velocity(&mut p, &ctx(&main, &modules, &space, 0.0, 0.1), &mut rng);
        // 2 + (6 - 2) * 0.5
        assert!((p.velocity.x - 4.0).abs() < 1e-5);

        modules.limit_velocity_over_lifetime.separate_axes = true;
        modules.limit_velocity_over_lifetime.limit_x = MinMaxCurve::constant(1.0);
        modules.limit_velocity_over_lifetime.limit_y = MinMaxCurve::constant(1.0);
        modules.limit_velocity_over_lifetime.dampen = 1.0;
        p.start_velocity = Vec3::new(3.0, -3.0, 0.0);
        update_velocity(&mut p, &ctx(&main, &modules, &space, 0.0, 0.1), &mut rng);
        // 只限制上界
        assert!((p.velocity.x - 1.0).abs() < 1e-5);
        assert!((p.velocity.y + 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_force_keeps_magnitude_across_spaces() {
        let main = MainModule {
            simulation_space: SimulationSpace::World,
            ..Default::default()
        };
        let mut modules = ParticleModules::default();
        modules.force_over_lifetime.enabled = true;
        modules.force_over_lifetime.space = SimulationSpace::Local;
        modules.force_over_lifetime.x = MinMaxCurve::constant(3.0);
        let space = SpaceTransform::from_transform(&Transform {
            rot: Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
            ..Default::default()
        });
        let mut rng = StdRng::seed_from_u64(1);

        let mut p = particle(1.0);
        update_velocity(&mut p, &ctx(&main, &modules, &space, 0.0, 1.0), &mut rng);
        assert!((p.force_velocity.length() - 3.0).abs() < 1e-4);
        // 局部 +X 旋转到世界 +Y
        assert!((p.force_velocity.y - 3.0).abs() < 1e-4);
    }

    #[test]
    fn test_external_force_and_inherit_velocity() {
        let main = MainModule::default();
        let mut modules = ParticleModules::default();
        modules.external_forces.enabled = true;
        modules.external_forces.multiplier = 2.0;
        modules.inherit_velocity.enabled = true;
        modules.inherit_velocity.mode = InheritVelocityMode::Current;
        modules.inherit_velocity.curve = MinMaxCurve::constant(0.5);
        let space = SpaceTransform::default();
        let mut rng = StdRng::seed_from_u64(1);

        let mut step = ctx(&main, &modules, &space, 0.0, 0.5);
        step.external_force = Vec3::new(1.0, 0.0, 0.0);
        step.emitter_velocity = Vec3::new(0.0, 0.0, 4.0);

        let mut p = particle(1.0);
        update_velocity(&mut p, &step, &mut rng);
        assert!((p.force_velocity.x - 1.0).abs() < 1e-6);
        assert!((p.velocity - Vec3::new(1.0, 0.0, 2.0)).length() < 1e-5);
    }

    #[test]
    fn test_lerp_stability_over_lifetime() {
        let main = MainModule::default();
        let mut modules = ParticleModules::default();
        modules.velocity_over_lifetime.enabled = true;
        modules.velocity_over_lifetime.x = MinMaxCurve::two_constants(-5.0, 5.0);
        let space = SpaceTransform::default();
        let mut rng = StdRng::seed_from_u64(11);

        let mut p = particle(1.0);
        update_velocity(&mut p, &ctx(&main, &modules, &space, 0.1, 0.1), &mut rng);
        let lerp = p.lerps.velocity_x;
        let first = p.velocity.x;
        assert!(lerp >= 0.0);
        // 常量曲线不抽取随机数
        assert_eq!(p.lerps.velocity_y, LERP_UNSET);

        update_velocity(&mut p, &ctx(&main, &modules, &space, 0.5, 0.1), &mut rng);
        assert_eq!(p.lerps.velocity_x, lerp);
        assert_eq!(p.velocity.x, first);
    }

    #[test]
    fn test_two_curves_lerp_is_fixed_per_particle() {
        let main = MainModule::default();
        let mut modules = ParticleModules::default();
        modules.velocity_over_lifetime.enabled = true;
        modules.velocity_over_lifetime.x = MinMaxCurve::two_curves(
            AnimationCurve::linear(0.0, -2.0, 1.0, 2.0),
            AnimationCurve::linear(0.0, 4.0, 1.0, 8.0),
            1.0,
        );
        let space = SpaceTransform::default();
        let mut rng = StdRng::seed_from_u64(23);

        let mut p = particle(1.0);
        update_velocity(&mut p, &ctx(&main, &modules, &space, 0.1, 0.1), &mut rng);
        let lerp = p.lerps.velocity_x;
        assert!((0.0..=1.0).contains(&lerp));
        assert!((p.velocity.x - (-2.0 + 6.0 * lerp)).abs() < 1e-4);

        // 生命周期过半，同一混合因子在两条曲线之间插值
        for (remaining, lo, hi) in [(0.5, 0.0, 6.0), (0.25, 1.0, 7.0)] {
            p.remaining_lifetime = remaining;
            update_velocity(&mut p, &ctx(&main, &modules, &space, 0.5, 0.1), &mut rng);
            assert_eq!(p.lerps.velocity_x, lerp);
            let expected = lo + (hi - lo) * lerp;
            assert!((p.velocity.x - expected).abs() < 1e-4, "{} vs {}", p.velocity.x, expected);
        }
    }

    #[test]
    fn test_disabled_modules_draw_nothing() {
        let main = MainModule::default();
        let mut modules = ParticleModules::default();
        modules.size_over_lifetime.size = MinMaxCurve::two_constants(0.0, 1.0);
        let space = SpaceTransform::default();
        let mut rng = StdRng::seed_from_u64(1);

        let mut p = particle(1.0);
        step_particle(&mut p, &ctx(&main, &modules, &space, 0.1, 0.1), &mut rng);
        assert_eq!(p.lerps, ParticleLerps::default());
    }

    #[test]
    fn test_angular_velocity_z_only() {
        let main = MainModule::default();
        let mut modules = ParticleModules::default();
        modules.rotation_over_lifetime.enabled = true;
        modules.rotation_over_lifetime.x = MinMaxCurve::constant(7.0);
        modules.rotation_over_lifetime.z = MinMaxCurve::constant(1.0);
        modules.rotation_by_speed.enabled = true;
        modules.rotation_by_speed.z = MinMaxCurve::curve(AnimationCurve::linear(0.0, 0.0, 1.0, 2.0), 1.0);
        modules.rotation_by_speed.range = Vec2::new(0.0, 4.0);
        let space = SpaceTransform::default();
        let mut rng = StdRng::seed_from_u64(1);

        let mut p = particle(1.0);
        p.velocity = Vec3::new(0.0, 2.0, 0.0);
        update_angular_velocity(&mut p, &ctx(&main, &modules, &space, 0.0, 0.1), &mut rng);
        assert_eq!(p.angular_velocity.x, 0.0);
        assert!((p.angular_velocity.z - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_color_multiplies_modules() {
        let main = MainModule::default();
        let mut modules = ParticleModules::default();
        modules.color_over_lifetime.enabled = true;
        modules.color_over_lifetime.color = MinMaxGradient::gradient(Gradient::two_point(
            Vec4::ONE,
            Vec4::new(1.0, 1.0, 1.0, 0.0),
        ));
        let space = SpaceTransform::default();
        let mut rng = StdRng::seed_from_u64(1);

        let mut p = particle(1.0);
        p.start_color = Vec4::new(1.0, 0.5, 0.0, 1.0);
        p.remaining_lifetime = 0.5;
        update_color(&mut p, &ctx(&main, &modules, &space, 0.0, 0.1), &mut rng);
        assert!((p.color - Vec4::new(1.0, 0.5, 0.0, 0.5)).length() < 1e-5);
    }

    #[test]
    fn test_size_scaling_modes() {
        let mut main = MainModule::default();
        let modules = ParticleModules::default();
        let global = crate::ecs::GlobalTransform {
            scale: Vec3::splat(3.0),
            ..Default::default()
        };
        let local = Transform {
            scale: Vec3::splat(2.0),
            ..Default::default()
        };
        let space = SpaceTransform::from_parts(&global, &local);
        let mut rng = StdRng::seed_from_u64(1);

        let mut p = particle(1.0);
        main.scaling_mode = ScalingMode::Hierarchy;
        update_size(&mut p, &ctx(&main, &modules, &space, 0.0, 0.1), &mut rng);
        assert_eq!(p.size, Vec3::splat(3.0));

        main.scaling_mode = ScalingMode::Local;
        update_size(&mut p, &ctx(&main, &modules, &space, 0.0, 0.1), &mut rng);
        assert_eq!(p.size, Vec3::splat(2.0));

        main.scaling_mode = ScalingMode::Shape;
        update_size(&mut p, &ctx(&main, &modules, &space, 0.0, 0.1), &mut rng);
        assert_eq!(p.size, Vec3::ONE);
    }

    #[test]
    fn test_texture_sheet_frames() {
        let main = MainModule::default();
        let mut modules = ParticleModules::default();
        let sheet = &mut modules.texture_sheet_animation;
        sheet.enabled = true;
        sheet.num_tiles_x = 4;
        sheet.num_tiles_y = 2;
        let space = SpaceTransform::default();
        let mut rng = StdRng::seed_from_u64(1);

        let mut p = particle(1.0);
        // 生命周期过半 → 第 4 帧（共 8 帧），位于第二行第一列
        p.remaining_lifetime = 0.5;
        update_uv(&mut p, &ctx(&main, &modules, &space, 0.0, 0.1), &mut rng);
        assert_eq!(p.uv_scale_offset, Vec4::new(0.25, 0.5, 0.0, 0.5));

        modules.texture_sheet_animation.animation = AnimationType::SingleRow;
        modules.texture_sheet_animation.use_random_row = false;
        modules.texture_sheet_animation.row_index = 1;
        p.remaining_lifetime = 0.75;
        update_uv(&mut p, &ctx(&main, &modules, &space, 0.0, 0.1), &mut rng);
        // 行 1，帧 1
        assert_eq!(p.uv_scale_offset, Vec4::new(0.25, 0.5, 0.25, 0.5));
    }

    #[test]
    fn test_step_particles_retires_dead() {
        let main = MainModule::default();
        let modules = ParticleModules::default();
        let space = SpaceTransform::default();
        let mut rng = StdRng::seed_from_u64(1);

        let mut particles = vec![particle(0.5), particle(2.0), particle(0.1)];
        let removed = step_particles(&mut particles, &ctx(&main, &modules, &space, 1.0, 0.1), &mut rng);
        assert_eq!(removed, 2);
        assert_eq!(particles.len(), 1);
        assert_eq!(particles[0].start_lifetime, 2.0);
    }

    #[test]
    fn test_speed_t() {
        assert_eq!(speed_t(5.0, Vec2::new(0.0, 10.0)), 0.5);
        assert_eq!(speed_t(20.0, Vec2::new(0.0, 10.0)), 1.0);
        assert_eq!(speed_t(-1.0, Vec2::new(0.0, 10.0)), 0.0);
        assert_eq!(speed_t(1.0, Vec2::new(1.0, 1.0)), 1.0);
    }

    proptest! {
        #[test]
        fn lifetime_is_monotonic(
            lifetime in 0.1f32..10.0,
            speed in 0.1f32..4.0,
            steps in proptest::collection::vec(0.0f32..0.2, 1..30),
        ) {
            let main = MainModule { simulation_speed: speed, ..Default::default() };
            let modules = ParticleModules::default();
            let space = SpaceTransform::default();
            let mut rng = StdRng::seed_from_u64(0);

            let mut p = particle(lifetime);
            let mut now = 0.0;
            let mut last = p.remaining_lifetime;
            for dt in steps {
                now += dt;
                update_lifetime(&mut p, &ctx(&main, &modules, &space, now, dt * speed));
                prop_assert!(p.remaining_lifetime <= last + 1e-6);
                prop_assert!(p.remaining_lifetime <= p.start_lifetime);
                last = p.remaining_lifetime;
            }
        }
    }
}
