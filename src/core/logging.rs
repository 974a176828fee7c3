//! 日志初始化
//!
//! 使用 tracing 框架。`RUST_LOG` 环境变量优先，否则使用配置中的日志级别。

use crate::config::{LogLevel, LoggingConfig};
use tracing_subscriber::EnvFilter;

impl LogLevel {
    /// 转换为 `EnvFilter` 指令字符串
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// 初始化日志系统
///
/// 重复调用是安全的：已有全局订阅者时直接返回 `false`。
pub fn init_logging(config: &LoggingConfig) -> bool {
    if !config.log_to_console {
        return false;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_filter()));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(target: "particles", "Logging initialized at {:?}", config.level);
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_filter() {
        assert_eq!(LogLevel::Trace.as_filter(), "trace");
        assert_eq!(LogLevel::Warn.as_filter(), "warn");
    }

    #[test]
    fn test_init_logging_is_idempotent() {
        let config = LoggingConfig::default();
        let _ = init_logging(&config);
        // 第二次安装必然失败，但不能 panic
        assert!(!init_logging(&config));
    }

    #[test]
    fn test_console_disabled() {
        let config = LoggingConfig {
            log_to_console: false,
            ..LoggingConfig::default()
        };
        assert!(!init_logging(&config));
    }
}
