//! # Particle Engine
//!
//! A per-frame CPU particle simulation and render-data generation engine.
//!
//! ## Features
//!
//! - **Emission**: play clock with start delay, looping, rate-over-time and bursts
//! - **Shapes**: sphere, hemisphere, cone, box, circle and edge emitters
//! - **Simulation**: velocity, force, gravity, limit, inherit velocity, color, size,
//!   rotation and texture-sheet modules driven by min/max curves
//! - **Geometry**: billboard, stretched, horizontal, vertical and mesh particles packed into
//!   16-bit indexed vertex buffers
//! - **ECS Integration**: `ParticleSystem` is a `bevy_ecs` component with ready-made systems
//!
//! ## Example
//!
//! ```ignore
//! use particle_engine::ecs::{SpaceTransform, Time};
//! use particle_engine::render::particles::{CameraView, ParticlePreset, ParticleSystem};
//! use particle_engine::render::CpuBufferBackend;
//!
//! let mut system = ParticleSystem::new(
//!     ParticlePreset::Fire.to_config(),
//!     Some(ParticlePreset::Fire.renderer()),
//! );
//! let mut time = Time::default();
//! let mut backend = CpuBufferBackend::new();
//! system.start(&time);
//!
//! time.advance(1.0 / 60.0);
//! system.update(&time, &SpaceTransform::default());
//! system.update_buffer(&mut backend, &CameraView::default(), &SpaceTransform::default())?;
//! ```
//!
//! ## Modules
//!
//! - [`core`]: Errors, logging and helper macros
//! - [`config`]: Engine configuration and named effect definitions
//! - [`ecs`]: Transforms, camera and time
//! - [`render`]: Buffer backends, vertex format and the particle system

/// Errors, logging and helper macros
pub mod core;
/// Configuration system
pub mod config;
/// Transforms, camera and time consumed by the particle systems
pub mod ecs;
/// Buffer backends and particle simulation
pub mod render;
