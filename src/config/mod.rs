/// 统一配置系统
///
/// 提供TOML/JSON配置文件、环境变量覆盖以及命名粒子效果定义
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::impl_default;
use crate::render::particles::ParticleSystemConfig;

/// 引擎配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 文件读取错误
    #[error("Config file error: {0}")]
    FileError(#[from] std::io::Error),
    /// 解析错误
    #[error("Config parse error: {0}")]
    ParseError(String),
    /// 验证错误
    #[error("Config validation error: {0}")]
    ValidationError(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// 粒子引擎主配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleEngineConfig {
    /// 日志配置
    pub logging: LoggingConfig,

    /// 模拟配置
    pub simulation: SimulationConfig,

    /// 命名粒子效果
    pub effects: BTreeMap<String, ParticleSystemConfig>,
}

impl ParticleEngineConfig {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 从TOML文件加载配置
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_toml_str(&content)
    }

    /// 从TOML字符串解析配置
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_json_str(&content)
    }

    /// 从JSON字符串解析配置
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 保存为TOML文件
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        fs::write(path, content).map_err(ConfigError::FileError)
    }

    /// 保存为JSON文件
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        fs::write(path, content).map_err(ConfigError::FileError)
    }

    /// 从环境变量覆盖配置
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("PARTICLE_SIMULATION_SPEED") {
            if let Ok(speed) = val.parse::<f32>() {
                for effect in self.effects.values_mut() {
                    effect.main.simulation_speed = speed;
                }
            }
        }
        if let Ok(val) = env::var("PARTICLE_MAX_PARTICLES") {
            if let Ok(max) = val.parse() {
                self.simulation.max_particles_per_system = max;
            }
        }
        if let Ok(val) = env::var("PARTICLE_RANDOM_SEED") {
            self.simulation.random_seed = val.parse().ok();
        }
        if let Ok(val) = env::var("PARTICLE_LOG_LEVEL") {
            if let Some(level) = LogLevel::parse(&val) {
                self.logging.level = level;
            }
        }
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        self.simulation.validate()?;
        for (name, effect) in &self.effects {
            effect.validate().map_err(|e| match e {
                ConfigError::ValidationError(msg) => {
                    ConfigError::ValidationError(format!("effect '{}': {}", name, msg))
                }
                other => other,
            })?;
        }
        Ok(())
    }

    /// 查找命名效果，并应用全局的粒子数上限
    pub fn effect(&self, name: &str) -> Option<ParticleSystemConfig> {
        self.effects.get(name).map(|effect| {
            let mut effect = effect.clone();
            effect.main.max_particles = effect
                .main
                .max_particles
                .min(self.simulation.max_particles_per_system);
            effect
        })
    }

    /// 自动查找并加载配置文件
    ///
    /// 按以下顺序查找：
    /// 1. ./particles.toml
    /// 2. ./particles.json
    /// 3. ~/.config/particle_engine/particles.toml
    /// 4. 使用默认配置
    pub fn load_or_default() -> Self {
        if let Ok(config) = Self::from_toml_file("particles.toml") {
            tracing::info!(target: "config", "Loaded config from particles.toml");
            return config;
        }

        if let Ok(config) = Self::from_json_file("particles.json") {
            tracing::info!(target: "config", "Loaded config from particles.json");
            return config;
        }

        if let Some(home) = env::var_os("HOME") {
            let config_path = PathBuf::from(home)
                .join(".config")
                .join("particle_engine")
                .join("particles.toml");

            if let Ok(config) = Self::from_toml_file(&config_path) {
                tracing::info!(target: "config", "Loaded config from {:?}", config_path);
                return config;
            }
        }

        tracing::info!(target: "config", "Using default configuration");
        Self::default()
    }
}

/// 模拟配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// 固定时间步长（秒），供宿主循环使用
    pub fixed_time_step: f32,

    /// 随机种子；`None` 表示使用系统熵
    pub random_seed: Option<u64>,

    /// 每个粒子系统的粒子数上限
    pub max_particles_per_system: u32,
}

impl_default!(SimulationConfig {
    fixed_time_step: 1.0 / 60.0,
    random_seed: None,
    max_particles_per_system: 16383,
});

impl SimulationConfig {
    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.fixed_time_step > 0.0) {
            return Err(ConfigError::ValidationError(
                "fixed_time_step must be positive".to_string(),
            ));
        }
        if self.max_particles_per_system == 0 {
            return Err(ConfigError::ValidationError(
                "max_particles_per_system must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: LogLevel,

    /// 是否输出到控制台
    pub log_to_console: bool,
}

impl_default!(LoggingConfig {
    level: LogLevel::Info,
    log_to_console: true,
});

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    /// 跟踪
    Trace,
    /// 调试
    Debug,
    /// 信息
    Info,
    /// 警告
    Warn,
    /// 错误
    Error,
}

impl LogLevel {
    /// 解析不区分大小写的级别名称
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::particles::{MinMaxCurve, ParticlePreset, ShapeType};

    #[test]
    fn test_default_config() {
        let config = ParticleEngineConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.effects.is_empty());
    }

    #[test]
    fn test_toml_serialization() {
        let mut config = ParticleEngineConfig::default();
        config
            .effects
            .insert("fire".to_string(), ParticlePreset::Fire.to_config());

        let toml_str = toml::to_string(&config).unwrap();
        let parsed: ParticleEngineConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(
            config.simulation.max_particles_per_system,
            parsed.simulation.max_particles_per_system
        );
        let fire = parsed.effects.get("fire").unwrap();
        assert_eq!(fire.main.max_particles, 500);
    }

    #[test]
    fn test_json_serialization() {
        let mut config = ParticleEngineConfig::default();
        config
            .effects
            .insert("smoke".to_string(), ParticlePreset::Smoke.to_config());

        let json_str = serde_json::to_string(&config).unwrap();
        let parsed: ParticleEngineConfig = serde_json::from_str(&json_str).unwrap();
        assert_eq!(parsed.effects.len(), 1);
    }

    #[test]
    fn test_partial_toml() {
        let config = ParticleEngineConfig::from_toml_str(
            r#"
            [simulation]
            random_seed = 7

            [effects.sparks.main]
            duration = 2.0
            looping = false

            [effects.sparks.main.start_lifetime]
            mode = "constant"
            value = 0.5

            [effects.sparks.shape]
            shape_type = "BoxEdge"
            "#,
        )
        .unwrap();

        assert_eq!(config.simulation.random_seed, Some(7));
        let sparks = config.effect("sparks").unwrap();
        assert_eq!(sparks.main.duration, 2.0);
        assert!(!sparks.main.looping);
        assert_eq!(sparks.main.start_lifetime, MinMaxCurve::constant(0.5));
        assert_eq!(sparks.shape.shape_type, ShapeType::BoxEdge);
    }

    #[test]
    fn test_effect_applies_global_cap() {
        let mut config = ParticleEngineConfig::default();
        config.simulation.max_particles_per_system = 100;
        config
            .effects
            .insert("fire".to_string(), ParticlePreset::Fire.to_config());
        assert_eq!(config.effect("fire").unwrap().main.max_particles, 100);
        assert!(config.effect("missing").is_none());
    }

    #[test]
    fn test_validation_names_effect() {
        let mut config = ParticleEngineConfig::default();
        let mut effect = ParticleSystemConfig::default();
        effect.main.duration = -1.0;
        config.effects.insert("broken".to_string(), effect);

        match config.validate() {
            Err(ConfigError::ValidationError(msg)) => assert!(msg.contains("broken")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_toml() {
        let result = ParticleEngineConfig::from_toml_str("[simulation\nrandom_seed = ");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!(LogLevel::parse("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("verbose"), None);
    }
}
