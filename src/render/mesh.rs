use glam::{Vec2, Vec3, Vec4};

use crate::core::error::{ParticleError, ParticleResult, MAX_VERTEX_COUNT};

/// 粒子顶点
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ParticleVertex {
    pub pos: [f32; 3],
    pub color: [f32; 4],
    pub uv: [f32; 2],
}

impl ParticleVertex {
    pub fn new(pos: Vec3, color: Vec4, uv: Vec2) -> Self {
        Self {
            pos: pos.to_array(),
            color: color.to_array(),
            uv: uv.to_array(),
        }
    }

    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<ParticleVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: 12,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: 28,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

/// Mesh 渲染模式下每个粒子复制的静态网格（只读）
#[derive(Clone, Debug, Default)]
pub struct ParticleMesh {
    pub vertices: Vec<Vec3>,
    pub uv: Vec<Vec2>,
    /// 可选的顶点颜色；为空时只使用粒子颜色
    pub colors: Vec<Vec4>,
    pub triangles: Vec<u16>,
}

impl ParticleMesh {
    pub fn new(vertices: Vec<Vec3>, uv: Vec<Vec2>, triangles: Vec<u16>) -> Self {
        Self {
            vertices,
            uv,
            colors: Vec::new(),
            triangles,
        }
    }

    pub fn with_colors(mut self, colors: Vec<Vec4>) -> Self {
        self.colors = colors;
        self
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn has_colors(&self) -> bool {
        !self.colors.is_empty() && self.colors.len() == self.vertices.len()
    }

    /// 检查顶点数在 16 位索引空间内，且所有三角形索引都指向已有顶点
    pub fn validate(&self) -> ParticleResult<()> {
        let vertex_count = self.vertex_count();
        if vertex_count >= MAX_VERTEX_COUNT {
            return Err(ParticleError::VertexBudgetExceeded {
                vertices: vertex_count,
            });
        }
        match self.triangles.iter().find(|&&i| usize::from(i) >= vertex_count) {
            Some(&index) => Err(ParticleError::InvalidMeshIndex {
                index,
                vertex_count,
            }),
            None => Ok(()),
        }
    }

    /// 单位四边形（XY 平面，朝 +Z）
    pub fn quad() -> Self {
        Self::new(
            vec![
                Vec3::new(-0.5, 0.5, 0.0),
                Vec3::new(-0.5, -0.5, 0.0),
                Vec3::new(0.5, -0.5, 0.0),
                Vec3::new(0.5, 0.5, 0.0),
            ],
            vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(0.0, 1.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(1.0, 0.0),
            ],
            vec![0, 1, 2, 0, 2, 3],
        )
    }

    /// 单位立方体（每面独立顶点）
    pub fn cube() -> Self {
        let faces: [(Vec3, Vec3, Vec3); 6] = [
            (Vec3::X, Vec3::Y, Vec3::Z),
            (Vec3::NEG_X, Vec3::Y, Vec3::NEG_Z),
            (Vec3::Y, Vec3::Z, Vec3::X),
            (Vec3::NEG_Y, Vec3::NEG_Z, Vec3::X),
            (Vec3::Z, Vec3::Y, Vec3::NEG_X),
            (Vec3::NEG_Z, Vec3::Y, Vec3::X),
        ];

        let mut vertices = Vec::with_capacity(24);
        let mut uv = Vec::with_capacity(24);
        let mut triangles = Vec::with_capacity(36);

        for (normal, up, right) in faces {
            let base = vertices.len() as u16;
            let center = normal * 0.5;
            vertices.push(center - right * 0.5 + up * 0.5);
            vertices.push(center - right * 0.5 - up * 0.5);
            vertices.push(center + right * 0.5 - up * 0.5);
            vertices.push(center + right * 0.5 + up * 0.5);
            uv.extend_from_slice(&[
                Vec2::new(0.0, 0.0),
                Vec2::new(0.0, 1.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(1.0, 0.0),
            ]);
            triangles.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        Self::new(vertices, uv, triangles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_layout_matches_struct() {
        assert_eq!(std::mem::size_of::<ParticleVertex>(), 36);
        let layout = ParticleVertex::desc();
        assert_eq!(layout.array_stride, 36);
        assert_eq!(layout.attributes.len(), 3);
    }

    #[test]
    fn test_vertex_bytes() {
        let v = ParticleVertex::new(Vec3::new(1.0, 2.0, 3.0), Vec4::ONE, Vec2::ZERO);
        let bytes: &[u8] = bytemuck::bytes_of(&v);
        assert_eq!(bytes.len(), 36);
        let pos: &[f32] = bytemuck::cast_slice(&bytes[..12]);
        assert_eq!(pos, &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_builtin_meshes() {
        let quad = ParticleMesh::quad();
        assert_eq!(quad.vertex_count(), 4);
        assert_eq!(quad.index_count(), 6);
        assert!(!quad.has_colors());

        let cube = ParticleMesh::cube();
        assert_eq!(cube.vertex_count(), 24);
        assert_eq!(cube.index_count(), 36);
        assert!(cube.triangles.iter().all(|&i| (i as usize) < cube.vertex_count()));
        assert!(cube.validate().is_ok());
        for v in &cube.vertices {
            assert!((v.abs().max_element() - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn test_validate_rejects_out_of_range_index() {
        let mut mesh = ParticleMesh::quad();
        mesh.triangles[4] = 4;
        assert!(matches!(
            mesh.validate(),
            Err(ParticleError::InvalidMeshIndex {
                index: 4,
                vertex_count: 4
            })
        ));

        let huge = ParticleMesh::new(vec![Vec3::ZERO; MAX_VERTEX_COUNT], Vec::new(), vec![0, 1, 2]);
        assert!(matches!(
            huge.validate(),
            Err(ParticleError::VertexBudgetExceeded { .. })
        ));
    }
}
