//! 渲染后端抽象
//!
//! 粒子系统只通过"创建缓冲区"和"填充缓冲区"两个契约与图形后端交互。
//!
//! ## 设计目标
//!
//! - 几何生成与 GPU 设备解耦，可在无 GPU 的环境中测试
//! - 缓冲区句柄跨帧复用，容量只增不减
//! - 扩容后旧缓冲区立即释放，槽位留给后续创建复用

use crate::core::error::{ParticleError, ParticleResult};
use bevy_ecs::prelude::Resource;

/// 缓冲区句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u64);

/// 缓冲区用途
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferUsage(pub u32);

impl BufferUsage {
    pub const VERTEX: Self = Self(1);
    pub const INDEX: Self = Self(2);
    pub const DYNAMIC: Self = Self(4);

    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl std::ops::BitOr for BufferUsage {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// 缓冲区后端
pub trait BufferBackend {
    /// 创建顶点缓冲区（字节数）
    fn create_vertex_buffer(&mut self, size: usize, dynamic: bool) -> ParticleResult<BufferHandle>;

    /// 创建索引缓冲区（字节数）
    fn create_index_buffer(&mut self, size: usize, dynamic: bool) -> ParticleResult<BufferHandle>;

    /// 缓冲区容量（字节数）
    fn buffer_size(&self, handle: BufferHandle) -> Option<usize>;

    /// 以 `size` 字节的区域调用写入回调
    fn fill(
        &mut self,
        handle: BufferHandle,
        size: usize,
        writer: &mut dyn FnMut(&mut [u8]),
    ) -> ParticleResult<()>;

    /// 释放缓冲区；句柄此后失效
    fn release(&mut self, handle: BufferHandle) -> ParticleResult<()>;
}

/// 放入第一个空槽位，没有空槽位时追加
fn insert_slot<T>(slots: &mut Vec<Option<T>>, value: T) -> BufferHandle {
    match slots.iter().position(Option::is_none) {
        Some(index) => {
            slots[index] = Some(value);
            BufferHandle(index as u64)
        }
        None => {
            slots.push(Some(value));
            BufferHandle(slots.len() as u64 - 1)
        }
    }
}

fn take_slot<T>(slots: &mut [Option<T>], handle: BufferHandle) -> ParticleResult<T> {
    slots
        .get_mut(handle.0 as usize)
        .and_then(Option::take)
        .ok_or(ParticleError::UnknownBuffer(handle))
}

fn check_fill_bounds(size: usize, capacity: usize) -> ParticleResult<()> {
    if size > capacity {
        return Err(ParticleError::FillOutOfBounds {
            requested: size,
            capacity,
        });
    }
    Ok(())
}

/// CPU 缓冲区
#[derive(Debug, Clone)]
pub struct CpuBuffer {
    pub usage: BufferUsage,
    pub data: Vec<u8>,
}

/// 基于内存的缓冲区后端
///
/// 用于无头运行和测试；数据可以直接读回。
#[derive(Resource, Debug, Default)]
pub struct CpuBufferBackend {
    buffers: Vec<Option<CpuBuffer>>,
}

impl CpuBufferBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// 存活的缓冲区数量
    pub fn buffer_count(&self) -> usize {
        self.buffers.iter().flatten().count()
    }

    /// 存活缓冲区的总字节数
    pub fn allocated_bytes(&self) -> usize {
        self.buffers.iter().flatten().map(|buffer| buffer.data.len()).sum()
    }

    pub fn buffer(&self, handle: BufferHandle) -> Option<&CpuBuffer> {
        self.buffers.get(handle.0 as usize).and_then(Option::as_ref)
    }

    /// 读回缓冲区前 `size` 字节
    pub fn read(&self, handle: BufferHandle, size: usize) -> Option<&[u8]> {
        self.buffer(handle)
            .and_then(|buffer| buffer.data.get(..size))
    }

    fn create(&mut self, size: usize, usage: BufferUsage) -> BufferHandle {
        insert_slot(
            &mut self.buffers,
            CpuBuffer {
                usage,
                data: vec![0; size],
            },
        )
    }
}

impl BufferBackend for CpuBufferBackend {
    fn create_vertex_buffer(&mut self, size: usize, dynamic: bool) -> ParticleResult<BufferHandle> {
        let usage = if dynamic {
            BufferUsage::VERTEX | BufferUsage::DYNAMIC
        } else {
            BufferUsage::VERTEX
        };
        Ok(self.create(size, usage))
    }

    fn create_index_buffer(&mut self, size: usize, dynamic: bool) -> ParticleResult<BufferHandle> {
        let usage = if dynamic {
            BufferUsage::INDEX | BufferUsage::DYNAMIC
        } else {
            BufferUsage::INDEX
        };
        Ok(self.create(size, usage))
    }

    fn buffer_size(&self, handle: BufferHandle) -> Option<usize> {
        self.buffer(handle).map(|buffer| buffer.data.len())
    }

    fn fill(
        &mut self,
        handle: BufferHandle,
        size: usize,
        writer: &mut dyn FnMut(&mut [u8]),
    ) -> ParticleResult<()> {
        let buffer = self
            .buffers
            .get_mut(handle.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(ParticleError::UnknownBuffer(handle))?;
        check_fill_bounds(size, buffer.data.len())?;
        writer(&mut buffer.data[..size]);
        Ok(())
    }

    fn release(&mut self, handle: BufferHandle) -> ParticleResult<()> {
        take_slot(&mut self.buffers, handle).map(drop)
    }
}

/// 基于 wgpu 的缓冲区后端
///
/// 写入回调先写入暂存区，再通过 `Queue::write_buffer` 上传。
pub struct WgpuBufferBackend {
    device: std::sync::Arc<wgpu::Device>,
    queue: std::sync::Arc<wgpu::Queue>,
    buffers: Vec<Option<(wgpu::Buffer, usize)>>,
    staging: Vec<u8>,
}

impl WgpuBufferBackend {
    pub fn new(device: std::sync::Arc<wgpu::Device>, queue: std::sync::Arc<wgpu::Queue>) -> Self {
        Self {
            device,
            queue,
            buffers: Vec::new(),
            staging: Vec::new(),
        }
    }

    /// 获取底层 wgpu 缓冲区，用于绘制调用
    pub fn raw_buffer(&self, handle: BufferHandle) -> Option<&wgpu::Buffer> {
        self.slot(handle).map(|(buffer, _)| buffer)
    }

    fn slot(&self, handle: BufferHandle) -> Option<&(wgpu::Buffer, usize)> {
        self.buffers.get(handle.0 as usize).and_then(Option::as_ref)
    }

    fn create(&mut self, label: &str, size: usize, usage: wgpu::BufferUsages) -> BufferHandle {
        // wgpu 要求写入大小按 4 字节对齐
        let aligned = (size.max(4) + 3) & !3;
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: aligned as wgpu::BufferAddress,
            usage: usage | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        insert_slot(&mut self.buffers, (buffer, aligned))
    }
}

impl BufferBackend for WgpuBufferBackend {
    fn create_vertex_buffer(&mut self, size: usize, _dynamic: bool) -> ParticleResult<BufferHandle> {
        Ok(self.create("Particle Vertex Buffer", size, wgpu::BufferUsages::VERTEX))
    }

    fn create_index_buffer(&mut self, size: usize, _dynamic: bool) -> ParticleResult<BufferHandle> {
        Ok(self.create("Particle Index Buffer", size, wgpu::BufferUsages::INDEX))
    }

    fn buffer_size(&self, handle: BufferHandle) -> Option<usize> {
        self.slot(handle).map(|(_, size)| *size)
    }

    fn fill(
        &mut self,
        handle: BufferHandle,
        size: usize,
        writer: &mut dyn FnMut(&mut [u8]),
    ) -> ParticleResult<()> {
        let (buffer, capacity) = self
            .buffers
            .get(handle.0 as usize)
            .and_then(Option::as_ref)
            .ok_or(ParticleError::UnknownBuffer(handle))?;
        check_fill_bounds(size, *capacity)?;

        let aligned = ((size + 3) & !3).min(*capacity);
        self.staging.clear();
        self.staging.resize(aligned, 0);
        writer(&mut self.staging[..size]);
        self.queue.write_buffer(buffer, 0, &self.staging);
        Ok(())
    }

    fn release(&mut self, handle: BufferHandle) -> ParticleResult<()> {
        let (buffer, _) = take_slot(&mut self.buffers, handle)?;
        buffer.destroy();
        Ok(())
    }
}
