//! 粒子系统
//!
//! `ParticleSystem` 是挂在实体上的组件，持有配置、存活粒子、随机数生成器、发射时钟和
//! 跨帧复用的顶点/索引缓冲区。每帧先 `update`（发射 + 积分），再 `update_buffer`
//! （生成几何并写入后端缓冲区）。
//!
//! ## 使用示例
//!
//! ```ignore
//! let mut system = ParticleSystem::new(
//!     ParticlePreset::Fire.to_config(),
//!     Some(ParticleSystemRenderer::default()),
//! );
//! system.start(&time);
//! system.update(&time, &SpaceTransform::default());
//! system.update_buffer(&mut backend, &camera, &SpaceTransform::default())?;
//! ```

use std::time::Instant;

use bevy_ecs::prelude::*;
use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::emission::{emission_cap, EmissionState};
use super::geometry::{
    indices_per_particle, vertices_per_particle, write_indices, write_vertices, CameraView,
    QUAD_VERTICES,
};
use super::integrator::{step_particles, StepContext};
use super::modules::{
    AnimationType, InheritVelocityMode, ParticleSystemConfig, ParticleSystemRenderer, ScalingMode,
    SimulationSpace,
};
use super::particle::{Particle, ParticleLerps};
use super::shape::{emit_shape, EmitShape};
use crate::config::ParticleEngineConfig;
use crate::core::error::{ParticleError, ParticleResult, MAX_VERTEX_COUNT};
use crate::ecs::{Camera, GlobalTransform, SpaceTransform, Time, Transform};
use crate::render::backend::{BufferBackend, BufferHandle};
use crate::render::mesh::ParticleVertex;

/// 粒子系统统计
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ParticleSystemStats {
    /// 当前存活粒子数
    pub alive_count: u32,
    /// 总发射数
    pub total_emitted: u64,
    /// 本帧发射数
    pub frame_emitted: u32,
    /// 本帧移除数
    pub frame_retired: u32,
    /// 模拟时间（ms）
    pub simulation_time_ms: f32,
    /// 几何生成和缓冲区写入时间（ms）
    pub render_time_ms: f32,
}

/// 跨帧复用的 GPU 缓冲区
#[derive(Debug, Clone, Copy)]
struct GpuBuffer {
    handle: BufferHandle,
    /// 容量（字节）
    capacity: usize,
}

/// 粒子系统组件
#[derive(Component)]
pub struct ParticleSystem {
    pub config: ParticleSystemConfig,
    pub renderer: Option<ParticleSystemRenderer>,
    particles: Vec<Particle>,
    emission: EmissionState,
    rng: StdRng,
    started: bool,
    /// 发射器上一帧的世界位置，用于估计发射器速度
    last_position: Option<Vec3>,
    external_force: Vec3,
    stats: ParticleSystemStats,

    // 临时缓冲（跨帧复用，避免每帧分配）
    offsets: Vec<f32>,
    vertices: Vec<ParticleVertex>,
    indices: Vec<u16>,

    vertex_buffer: Option<GpuBuffer>,
    index_buffer: Option<GpuBuffer>,
    index_count: usize,
}

impl ParticleSystem {
    pub fn new(config: ParticleSystemConfig, renderer: Option<ParticleSystemRenderer>) -> Self {
        Self::with_rng(config, renderer, StdRng::from_entropy())
    }

    /// 使用固定种子，便于复现
    pub fn with_seed(
        config: ParticleSystemConfig,
        renderer: Option<ParticleSystemRenderer>,
        seed: u64,
    ) -> Self {
        Self::with_rng(config, renderer, StdRng::seed_from_u64(seed))
    }

    /// 从引擎配置中的命名效果创建；应用全局上限和随机种子
    pub fn from_effect(
        engine: &ParticleEngineConfig,
        name: &str,
        renderer: Option<ParticleSystemRenderer>,
    ) -> Option<Self> {
        let config = engine.effect(name)?;
        Some(match engine.simulation.random_seed {
            Some(seed) => Self::with_seed(config, renderer, seed),
            None => Self::new(config, renderer),
        })
    }

    fn with_rng(
        config: ParticleSystemConfig,
        renderer: Option<ParticleSystemRenderer>,
        rng: StdRng,
    ) -> Self {
        Self {
            config,
            renderer,
            particles: Vec::new(),
            emission: EmissionState::new(),
            rng,
            started: false,
            last_position: None,
            external_force: Vec3::ZERO,
            stats: ParticleSystemStats::default(),
            offsets: Vec::new(),
            vertices: Vec::new(),
            indices: Vec::new(),
            vertex_buffer: None,
            index_buffer: None,
            index_count: 0,
        }
    }

    /// 启动播放：采样一次开始延迟并设置开始时刻
    pub fn start(&mut self, time: &Time) {
        let now = time.now();
        let delay = self
            .config
            .main
            .start_delay
            .evaluate_random(0.0, &mut self.rng)
            .max(0.0);
        self.emission.start(now, delay);
        self.started = true;

        if let Some(Err(err)) = self.renderer.as_ref().map(ParticleSystemRenderer::validate) {
            tracing::warn!(target: "particles", error = %err, "Particle renderer cannot produce geometry");
        }

        tracing::debug!(
            target: "particles",
            now,
            delay,
            max_particles = self.config.main.max_particles,
            "Particle system started"
        );
    }

    #[inline]
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// 受 16 位索引空间约束的粒子上限
    pub fn effective_max_particles(&self) -> usize {
        let vpp = self
            .renderer
            .as_ref()
            .and_then(|renderer| vertices_per_particle(renderer).ok())
            .unwrap_or(QUAD_VERTICES)
            .max(1);
        (self.config.main.max_particles as usize).min(usize::from(u16::MAX) / vpp)
    }

    /// 推进一帧：发射新粒子，然后积分所有存活粒子
    pub fn update(&mut self, time: &Time, space: &SpaceTransform) {
        if self.renderer.is_none() || !self.config.emission.enabled {
            return;
        }

        let started = Instant::now();
        let now = time.now();
        let delta_time = time.delta_seconds;

        let emitter_velocity = match self.last_position {
            Some(last) if delta_time > 0.0 => (space.position - last) / delta_time,
            _ => Vec3::ZERO,
        };
        self.last_position = Some(space.position);

        let emitted = self.emit(now, space, emitter_velocity);

        let ctx = StepContext {
            main: &self.config.main,
            modules: &self.config.modules,
            space,
            now,
            delta_time: delta_time * self.config.main.simulation_speed,
            emitter_velocity,
            external_force: self.external_force,
        };
        let retired = step_particles(&mut self.particles, &ctx, &mut self.rng);

        self.stats.frame_emitted = emitted as u32;
        self.stats.frame_retired = retired as u32;
        self.stats.total_emitted += emitted as u64;
        self.stats.alive_count = self.particles.len() as u32;
        self.stats.simulation_time_ms = started.elapsed().as_secs_f32() * 1000.0;
    }

    fn emit(&mut self, now: f32, space: &SpaceTransform, emitter_velocity: Vec3) -> usize {
        let mut offsets = std::mem::take(&mut self.offsets);
        let max_particles = self.effective_max_particles();
        let capacity = max_particles.saturating_sub(self.particles.len());
        self.emission.schedule(
            &self.config.emission,
            &self.config.main,
            now,
            capacity,
            &mut self.rng,
            &mut offsets,
        );

        let accepted = emission_cap(offsets.len(), max_particles, self.particles.len());

        let duration = self.config.main.duration;
        let play_t = if duration > 0.0 {
            self.emission.time / duration
        } else {
            0.0
        };

        self.particles.reserve(accepted);
        for &offset in &offsets[..accepted] {
            let particle = spawn_particle(
                &self.config,
                play_t,
                now - offset,
                space,
                emitter_velocity,
                &mut self.rng,
            );
            self.particles.push(particle);
        }

        self.offsets = offsets;
        accepted
    }

    #[inline]
    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    #[inline]
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    #[inline]
    pub fn stats(&self) -> ParticleSystemStats {
        self.stats
    }

    pub fn set_external_force(&mut self, force: Vec3) {
        self.external_force = force;
    }

    #[inline]
    pub fn external_force(&self) -> Vec3 {
        self.external_force
    }

    /// 清空存活粒子并重置发射时钟和爆发状态；开始时刻保留
    pub fn clear(&mut self) {
        self.particles.clear();
        self.emission.reset();
        self.last_position = None;
        self.stats.alive_count = 0;
        self.index_count = 0;
    }

    pub fn vertex_buffer(&self) -> Option<BufferHandle> {
        self.vertex_buffer.map(|buffer| buffer.handle)
    }

    pub fn index_buffer(&self) -> Option<BufferHandle> {
        self.index_buffer.map(|buffer| buffer.handle)
    }

    /// 子网格的索引范围 `(start, count)`；粒子系统只有一个子网格
    pub fn index_range(&self, submesh: usize) -> (usize, usize) {
        if submesh == 0 {
            (0, self.index_count)
        } else {
            (0, 0)
        }
    }

    /// 为当前存活粒子生成几何并写入后端缓冲区
    ///
    /// 缓冲区只增不减；每次调用都完整重写使用中的区域。
    pub fn update_buffer<B: BufferBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        camera: &CameraView,
        space: &SpaceTransform,
    ) -> ParticleResult<()> {
        let Some(renderer) = self.renderer.as_ref() else {
            return Ok(());
        };

        self.index_count = 0;
        let count = self.particles.len();
        if count == 0 {
            return Ok(());
        }

        let started = Instant::now();
        let vpp = vertices_per_particle(renderer)?;
        let ipp = indices_per_particle(renderer)?;

        let vertex_count = count * vpp;
        debug_assert!(vertex_count < MAX_VERTEX_COUNT);
        if vertex_count >= MAX_VERTEX_COUNT {
            return Err(ParticleError::VertexBudgetExceeded {
                vertices: vertex_count,
            });
        }
        let index_count = count * ipp;

        let vertex_bytes = vertex_count * std::mem::size_of::<ParticleVertex>();
        let index_bytes = index_count * std::mem::size_of::<u16>();

        let vertex_buffer = ensure_capacity(backend, self.vertex_buffer, vertex_bytes, BufferKind::Vertex)?;
        self.vertex_buffer = Some(vertex_buffer);
        let index_buffer = ensure_capacity(backend, self.index_buffer, index_bytes, BufferKind::Index)?;
        self.index_buffer = Some(index_buffer);

        self.vertices.clear();
        self.vertices.resize(vertex_count, ParticleVertex::default());
        write_vertices(
            &self.particles,
            renderer,
            self.config.main.simulation_space,
            camera,
            space,
            &mut self.vertices,
        )?;

        self.indices.clear();
        self.indices.resize(index_count, 0);
        write_indices(count, renderer, &mut self.indices)?;

        let vertices = &self.vertices;
        backend.fill(vertex_buffer.handle, vertex_bytes, &mut |dst: &mut [u8]| {
            dst.copy_from_slice(bytemuck::cast_slice(vertices));
        })?;
        let indices = &self.indices;
        backend.fill(index_buffer.handle, index_bytes, &mut |dst: &mut [u8]| {
            dst.copy_from_slice(bytemuck::cast_slice(indices));
        })?;

        self.index_count = index_count;
        self.stats.render_time_ms = started.elapsed().as_secs_f32() * 1000.0;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BufferKind {
    Vertex,
    Index,
}

/// 容量不足时重新创建缓冲区并释放旧缓冲区
fn ensure_capacity<B: BufferBackend + ?Sized>(
    backend: &mut B,
    current: Option<GpuBuffer>,
    required: usize,
    kind: BufferKind,
) -> ParticleResult<GpuBuffer> {
    match current {
        Some(buffer) if buffer.capacity >= required => Ok(buffer),
        _ => {
            let handle = match kind {
                BufferKind::Vertex => backend.create_vertex_buffer(required, true)?,
                BufferKind::Index => backend.create_index_buffer(required, true)?,
            };
            let capacity = backend.buffer_size(handle).unwrap_or(required);
            if let Some(old) = current {
                backend.release(old.handle)?;
            }
            tracing::debug!(
                target: "particles",
                kind = ?kind,
                capacity,
                "Particle buffer grown"
            );
            Ok(GpuBuffer { handle, capacity })
        }
    }
}

/// 创建一个新粒子；所有初始曲线使用各自独立的随机混合因子
fn spawn_particle<R: Rng + ?Sized>(
    config: &ParticleSystemConfig,
    play_t: f32,
    emit_time: f32,
    space: &SpaceTransform,
    emitter_velocity: Vec3,
    rng: &mut R,
) -> Particle {
    let main = &config.main;

    let start_lifetime = main.start_lifetime.evaluate_random(play_t, rng);
    let start_speed = main.start_speed.evaluate_random(play_t, rng);
    let start_size = if main.start_size_3d {
        Vec3::new(
            main.start_size_x.evaluate_random(play_t, rng),
            main.start_size_y.evaluate_random(play_t, rng),
            main.start_size_z.evaluate_random(play_t, rng),
        )
    } else {
        Vec3::splat(main.start_size.evaluate_random(play_t, rng))
    };
    let rotation = if main.start_rotation_3d {
        Vec3::new(
            main.start_rotation_x.evaluate_random(play_t, rng),
            main.start_rotation_y.evaluate_random(play_t, rng),
            main.start_rotation_z.evaluate_random(play_t, rng),
        )
    } else {
        Vec3::new(0.0, 0.0, main.start_rotation.evaluate_random(play_t, rng))
    };
    let start_color = main.start_color.evaluate_random(play_t, rng);

    let shape = if config.shape.enabled {
        emit_shape(&config.shape, rng)
    } else {
        EmitShape::default()
    };

    let scale = match main.scaling_mode {
        ScalingMode::Hierarchy | ScalingMode::Shape => space.world_scale,
        ScalingMode::Local => space.local_scale,
    };
    let mut position = shape.position * scale;
    let mut velocity = shape.direction * start_speed;

    if main.simulation_space == SimulationSpace::World {
        velocity = space.local_to_world.transform_vector3(velocity);
        position = space.unscaled_local_to_world().transform_point3(position);
    }

    let mut lerps = ParticleLerps::default();

    let inherit = &config.modules.inherit_velocity;
    if inherit.enabled && inherit.mode == InheritVelocityMode::Initial {
        let k = inherit
            .curve
            .evaluate_cached(0.0, &mut lerps.inherit_velocity, rng);
        let inherited = match main.simulation_space {
            SimulationSpace::World => emitter_velocity,
            SimulationSpace::Local => space.world_to_local.transform_vector3(emitter_velocity),
        };
        velocity += inherited * k;
    }

    let sheet = &config.modules.texture_sheet_animation;
    let texture_sheet_animation_row = if sheet.enabled
        && sheet.animation == AnimationType::SingleRow
        && sheet.use_random_row
    {
        rng.gen_range(0..sheet.num_tiles_y.max(1))
    } else {
        0
    };

    Particle {
        emit_time,
        start_lifetime,
        remaining_lifetime: start_lifetime,
        position,
        velocity,
        start_velocity: velocity,
        rotation,
        start_color,
        color: start_color,
        start_size,
        size: start_size,
        texture_sheet_animation_row,
        lerps,
        ..Default::default()
    }
}

// ============================================================================
// ECS 系统
// ============================================================================

fn space_of(transform: &Transform, global: Option<&GlobalTransform>) -> SpaceTransform {
    match global {
        Some(global) => SpaceTransform::from_parts(global, transform),
        None => SpaceTransform::from_transform(transform),
    }
}

/// 启动尚未启动的粒子系统，然后推进所有粒子系统
pub fn particle_system_update_system(
    time: Res<Time>,
    mut query: Query<(&mut ParticleSystem, &Transform, Option<&GlobalTransform>)>,
) {
    for (mut system, transform, global) in query.iter_mut() {
        if !system.is_started() {
            system.start(&time);
        }
        let space = space_of(transform, global);
        system.update(&time, &space);
    }
}

/// 用活动相机生成几何并写入缓冲区；需在 `particle_system_update_system` 之后运行
pub fn particle_buffer_system<B: BufferBackend + Resource>(
    mut backend: ResMut<B>,
    cameras: Query<(&Camera, &GlobalTransform)>,
    mut query: Query<(&mut ParticleSystem, &Transform, Option<&GlobalTransform>)>,
) {
    let Some(camera) = cameras
        .iter()
        .find(|(camera, _)| camera.is_active)
        .map(|(_, transform)| CameraView::from_global(transform))
    else {
        return;
    };

    for (mut system, transform, global) in query.iter_mut() {
        let space = space_of(transform, global);
        if let Err(err) = system.update_buffer(&mut *backend, &camera, &space) {
            tracing::warn!(target: "particles", error = %err, "Failed to update particle buffers");
        }
    }
}
