//! 核心模块
//!
//! 包含引擎的核心功能：
//! - `error` - 错误类型定义
//! - `logging` - 日志初始化
//! - `macros` - 配置结构体辅助宏

pub mod error;
pub mod logging;
#[macro_use]
pub mod macros;

pub use error::{ParticleError, ParticleResult, MAX_VERTEX_COUNT};
pub use logging::init_logging;
