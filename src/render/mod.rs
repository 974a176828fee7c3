//! 渲染模块
//!
//! - `backend` - 缓冲区后端抽象（CPU / wgpu）
//! - `mesh` - 粒子顶点格式与网格资源
//! - `particles` - 粒子模拟与几何生成

pub mod backend;
pub mod mesh;
pub mod particles;

pub use backend::{BufferBackend, BufferHandle, CpuBufferBackend, WgpuBufferBackend};
pub use mesh::{ParticleMesh, ParticleVertex};
pub use particles::{CameraView, ParticlePreset, ParticleSystem, ParticleSystemConfig};
