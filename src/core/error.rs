//! 统一错误处理模块
//!
//! 粒子引擎的实时路径（发射、积分）不返回错误：未实现的发射形状只记录警告，
//! 缺失的渲染器或形状配置等同于禁用对应阶段。
//!
//! `ParticleError` 只出现在与外部协作者交互的边界上：缓冲区后端、网格资源和配置加载。

use crate::config::ConfigError;
use crate::render::backend::BufferHandle;
use thiserror::Error;

/// 16 位索引空间允许的最大顶点数（不含）
pub const MAX_VERTEX_COUNT: usize = 65536;

/// 粒子引擎错误类型
#[derive(Error, Debug)]
pub enum ParticleError {
    #[error("Vertex budget exceeded: {vertices} vertices do not fit a 16-bit index buffer")]
    VertexBudgetExceeded { vertices: usize },

    #[error("Unknown buffer handle: {0:?}")]
    UnknownBuffer(BufferHandle),

    #[error("Buffer fill out of bounds: requested {requested} bytes, capacity {capacity} bytes")]
    FillOutOfBounds { requested: usize, capacity: usize },

    #[error("Mesh render mode requires a mesh")]
    MissingMesh,

    #[error("Mesh index {index} out of range for {vertex_count} vertices")]
    InvalidMeshIndex { index: u16, vertex_count: usize },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// 粒子引擎结果类型别名
pub type ParticleResult<T> = Result<T, ParticleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ParticleError::VertexBudgetExceeded { vertices: 70000 };
        assert!(err.to_string().contains("70000"));

        let err = ParticleError::FillOutOfBounds {
            requested: 128,
            capacity: 64,
        };
        assert!(err.to_string().contains("128"));
        assert!(err.to_string().contains("64"));

        let err = ParticleError::InvalidMeshIndex {
            index: 9,
            vertex_count: 4,
        };
        assert!(err.to_string().contains('9'));
    }

    #[test]
    fn test_error_conversion() {
        let config_err = ConfigError::ValidationError("duration must be positive".to_string());
        let err: ParticleError = config_err.into();
        assert!(matches!(err, ParticleError::Config(_)));
    }
}
