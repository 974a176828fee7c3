//! 几何生成
//!
//! 把存活粒子集合按渲染模式展开为顶点和 16 位索引。
//! 第 `i` 个粒子占用顶点槽 `[i * vpp, (i + 1) * vpp)`，`vpp` 为每粒子顶点数。

use glam::{EulerRot, Mat3, Mat4, Quat, Vec2, Vec3};

use super::modules::{ParticleSystemRenderer, RenderMode, SimulationSpace};
use super::particle::Particle;
use crate::core::error::{ParticleError, ParticleResult, MAX_VERTEX_COUNT};
use crate::ecs::{GlobalTransform, SpaceTransform};
use crate::render::mesh::{ParticleMesh, ParticleVertex};

/// 四边形的顶点数和索引数
pub const QUAD_VERTICES: usize = 4;
pub const QUAD_INDICES: usize = 6;

const QUAD_TRIANGLES: [u16; QUAD_INDICES] = [0, 1, 2, 0, 2, 3];

/// 生成几何时使用的相机数据
#[derive(Debug, Clone, Copy)]
pub struct CameraView {
    pub camera_to_world: Mat4,
    pub world_to_camera: Mat4,
    pub rotation: Quat,
}

impl Default for CameraView {
    fn default() -> Self {
        Self::from_global(&GlobalTransform::default())
    }
}

impl CameraView {
    pub fn from_global(transform: &GlobalTransform) -> Self {
        let camera_to_world = Mat4::from_rotation_translation(transform.rot, transform.pos);
        Self {
            camera_to_world,
            world_to_camera: camera_to_world.inverse(),
            rotation: transform.rot,
        }
    }

    /// 相机前方向（-Z）
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }
}

/// 欧拉角（弧度）转四元数：先 Z，再 X，最后 Y
#[inline]
pub fn euler_rotation(euler: Vec3) -> Quat {
    Quat::from_euler(EulerRot::YXZ, euler.y, euler.x, euler.z)
}

/// 构造 +Z 指向 `forward`、+Y 尽量贴近 `up` 的旋转
pub fn look_rotation(forward: Vec3, up: Vec3) -> Quat {
    let f = forward.normalize_or_zero();
    let r = up.cross(f).normalize_or_zero();
    let u = f.cross(r);
    Quat::from_mat3(&Mat3::from_cols(r, u, f))
}

fn render_mesh(renderer: &ParticleSystemRenderer) -> ParticleResult<&ParticleMesh> {
    match renderer.mesh.as_deref() {
        Some(mesh) if mesh.vertex_count() > 0 => Ok(mesh),
        _ => Err(ParticleError::MissingMesh),
    }
}

/// 每个粒子占用的顶点数
pub fn vertices_per_particle(renderer: &ParticleSystemRenderer) -> ParticleResult<usize> {
    match renderer.render_mode {
        RenderMode::Mesh => render_mesh(renderer).map(ParticleMesh::vertex_count),
        _ => Ok(QUAD_VERTICES),
    }
}

/// 每个粒子占用的索引数
pub fn indices_per_particle(renderer: &ParticleSystemRenderer) -> ParticleResult<usize> {
    match renderer.render_mode {
        RenderMode::Mesh => render_mesh(renderer).map(ParticleMesh::index_count),
        _ => Ok(QUAD_INDICES),
    }
}

/// 写入顶点；`out` 的长度必须为 `particles.len() * vertices_per_particle`
pub fn write_vertices(
    particles: &[Particle],
    renderer: &ParticleSystemRenderer,
    simulation_space: SimulationSpace,
    camera: &CameraView,
    space: &SpaceTransform,
    out: &mut [ParticleVertex],
) -> ParticleResult<()> {
    let vpp = vertices_per_particle(renderer)?;
    debug_assert_eq!(out.len(), particles.len() * vpp);

    let to_world = space.unscaled_local_to_world();

    for (p, slots) in particles.iter().zip(out.chunks_exact_mut(vpp)) {
        let (pos_world, velocity_world) = match simulation_space {
            SimulationSpace::World => (p.position, p.velocity),
            SimulationSpace::Local => (
                to_world.transform_point3(p.position),
                to_world.transform_vector3(p.velocity),
            ),
        };

        let mut mode = renderer.render_mode;
        if mode == RenderMode::Stretch && p.velocity.length_squared() <= f32::EPSILON {
            mode = RenderMode::Billboard;
        }

        match mode {
            RenderMode::Billboard => write_billboard(p, pos_world, camera, slots),
            RenderMode::Stretch => write_stretch(p, pos_world, velocity_world, renderer, camera, slots),
            RenderMode::HorizontalBillboard => write_horizontal(p, pos_world, slots),
            RenderMode::VerticalBillboard => write_vertical(p, pos_world, camera, slots),
            RenderMode::Mesh => write_mesh(p, pos_world, render_mesh(renderer)?, camera, slots),
        }
    }

    Ok(())
}

/// 写入索引；`out` 的长度必须为 `particle_count * indices_per_particle`
///
/// 网格的三角形索引必须全部小于其顶点数，总顶点数必须小于 [`MAX_VERTEX_COUNT`]。
pub fn write_indices(
    particle_count: usize,
    renderer: &ParticleSystemRenderer,
    out: &mut [u16],
) -> ParticleResult<()> {
    let (triangles, vpp): (&[u16], usize) = match renderer.render_mode {
        RenderMode::Mesh => {
            let mesh = render_mesh(renderer)?;
            mesh.validate()?;
            (mesh.triangles.as_slice(), mesh.vertex_count())
        }
        _ => (&QUAD_TRIANGLES[..], QUAD_VERTICES),
    };

    let vertices = particle_count * vpp;
    if vertices >= MAX_VERTEX_COUNT {
        return Err(ParticleError::VertexBudgetExceeded { vertices });
    }
    debug_assert_eq!(out.len(), particle_count * triangles.len());
    if triangles.is_empty() {
        return Ok(());
    }

    for (i, chunk) in out.chunks_exact_mut(triangles.len()).enumerate() {
        let base = u16::try_from(i * vpp)
            .map_err(|_| ParticleError::VertexBudgetExceeded { vertices })?;
        for (dst, &index) in chunk.iter_mut().zip(triangles) {
            *dst = base
                .checked_add(index)
                .ok_or(ParticleError::InvalidMeshIndex {
                    index,
                    vertex_count: vpp,
                })?;
        }
    }

    Ok(())
}

/// 四边形 UV：(sx, sy, ox, oy)
#[inline]
fn quad_uvs(p: &Particle, stretch: bool) -> [Vec2; 4] {
    let s = p.uv_scale_offset;
    let (sx, sy, ox, oy) = (s.x, s.y, s.z, s.w);
    if stretch {
        [
            Vec2::new(ox, sy + oy),
            Vec2::new(sx + ox, sy + oy),
            Vec2::new(sx + ox, oy),
            Vec2::new(ox, oy),
        ]
    } else {
        [
            Vec2::new(ox, oy),
            Vec2::new(ox, sy + oy),
            Vec2::new(sx + ox, sy + oy),
            Vec2::new(sx + ox, oy),
        ]
    }
}

#[inline]
fn fill_quad(p: &Particle, corners: [Vec3; 4], stretch: bool, slots: &mut [ParticleVertex]) {
    let uvs = quad_uvs(p, stretch);
    for ((slot, corner), uv) in slots.iter_mut().zip(corners).zip(uvs) {
        *slot = ParticleVertex::new(corner, p.color, uv);
    }
}

/// XY 平面四边形的四个角：左上、左下、右下、右上
#[inline]
fn xy_corners(size: Vec3) -> [Vec3; 4] {
    let hx = size.x * 0.5;
    let hy = size.y * 0.5;
    [
        Vec3::new(-hx, hy, 0.0),
        Vec3::new(-hx, -hy, 0.0),
        Vec3::new(hx, -hy, 0.0),
        Vec3::new(hx, hy, 0.0),
    ]
}

fn write_billboard(p: &Particle, pos_world: Vec3, camera: &CameraView, slots: &mut [ParticleVertex]) {
    let rot = euler_rotation(p.rotation);
    let pos_view = camera.world_to_camera.transform_point3(pos_world);
    let corners = xy_corners(p.size)
        .map(|c| camera.camera_to_world.transform_point3(pos_view + rot * c));
    fill_quad(p, corners, false, slots);
}

fn write_stretch(
    p: &Particle,
    pos_world: Vec3,
    velocity_world: Vec3,
    renderer: &ParticleSystemRenderer,
    camera: &CameraView,
    slots: &mut [ParticleVertex],
) {
    let forward = velocity_world.normalize_or_zero();
    let right = forward.cross(camera.forward());
    let rot = if right.length_squared() <= f32::EPSILON {
        Quat::from_rotation_arc(Vec3::Z, forward)
    } else {
        look_rotation(forward, forward.cross(right))
    };

    let length = p.size.y * renderer.length_scale + velocity_world.length() * renderer.velocity_scale;
    let hx = p.size.x * 0.5;
    let corners = [
        Vec3::new(-hx, 0.0, 0.0),
        Vec3::new(-hx, 0.0, -length),
        Vec3::new(hx, 0.0, -length),
        Vec3::new(hx, 0.0, 0.0),
    ]
    .map(|c| pos_world + rot * c);
    fill_quad(p, corners, true, slots);
}

fn write_horizontal(p: &Particle, pos_world: Vec3, slots: &mut [ParticleVertex]) {
    let rot = Quat::from_rotation_z(p.rotation.z);
    let hx = p.size.x * 0.5;
    let hz = p.size.y * 0.5;
    let corners = [
        Vec3::new(-hx, 0.0, hz),
        Vec3::new(-hx, 0.0, -hz),
        Vec3::new(hx, 0.0, -hz),
        Vec3::new(hx, 0.0, hz),
    ]
    .map(|c| pos_world + rot * c);
    fill_quad(p, corners, false, slots);
}

fn write_vertical(p: &Particle, pos_world: Vec3, camera: &CameraView, slots: &mut [ParticleVertex]) {
    let (yaw, _, _) = camera.rotation.to_euler(EulerRot::YXZ);
    let rot = Quat::from_euler(EulerRot::YXZ, yaw, 0.0, p.rotation.z);
    let corners = xy_corners(p.size).map(|c| pos_world + rot * c);
    fill_quad(p, corners, false, slots);
}

fn write_mesh(
    p: &Particle,
    pos_world: Vec3,
    mesh: &ParticleMesh,
    camera: &CameraView,
    slots: &mut [ParticleVertex],
) {
    let local = Mat4::from_scale_rotation_translation(p.size, euler_rotation(p.rotation), Vec3::ZERO);
    let pos_view = camera.world_to_camera.transform_point3(pos_world);
    let tinted = mesh.has_colors();

    for (j, (slot, vertex)) in slots.iter_mut().zip(&mesh.vertices).enumerate() {
        let view = pos_view + local.transform_point3(*vertex);
        let color = if tinted { p.color * mesh.colors[j] } else { p.color };
        let uv = mesh.uv.get(j).copied().unwrap_or(Vec2::ZERO);
        *slot = ParticleVertex::new(camera.camera_to_world.transform_point3(view), color, uv);
    }
}
