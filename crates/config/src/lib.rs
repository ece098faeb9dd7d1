//! warden-config - 配置加载库
//!
//! 按 `default.toml` -> `<APP_ENV>.toml` -> `WARDEN_*` 环境变量的顺序合并

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use secrecy::Secret;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] figment::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// 存储后端
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// 数据库缓存表
    #[default]
    Postgres,
    /// Redis
    Redis,
    /// 进程内存储（从 fixture 文件加载，用于演练）
    Memory,
}

/// 存储访问配置
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// 单次管理操作的截止时间
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// 每页扫描的键数量
    #[serde(default = "default_scan_batch_size")]
    pub scan_batch_size: usize,
    /// memory 后端的初始数据（JSON）
    pub fixture_path: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            timeout_secs: default_timeout_secs(),
            scan_batch_size: default_scan_batch_size(),
            fixture_path: None,
        }
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_scan_batch_size() -> usize {
    500
}

/// 数据库配置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// 缓存表名
    #[serde(default = "default_table")]
    pub table: String,
    /// 物理键前缀（如 `:1:`）
    #[serde(default)]
    pub key_prefix: String,
}

fn default_max_connections() -> u32 {
    // 管理工具是单次执行，连接数保持很小
    2
}

fn default_table() -> String {
    "cache_table".to_string()
}

/// Redis 配置
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: Secret<String>,
    #[serde(default)]
    pub key_prefix: String,
}

/// 日志输出格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// 遥测配置
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

/// 连接重试配置
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    2000
}

/// 应用配置
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,
    pub database: Option<DatabaseConfig>,
    pub redis: Option<RedisConfig>,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub retry: RetrySettings,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config: Self = Figment::new()
            .merge(Toml::file(format!("{}/default.toml", config_dir)))
            .merge(Toml::file(format!("{}/{}.toml", config_dir, env)))
            .merge(Env::prefixed("WARDEN_").split("__"))
            .extract()?;

        Ok(config)
    }

    /// 检查所选后端所需的配置段是否齐全，以及超时、分页参数是否为正
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.store.backend {
            StoreBackend::Postgres => {
                let database = self.database.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("store.backend = postgres requires [database]".into())
                })?;
                if !is_valid_identifier(&database.table) {
                    return Err(ConfigError::Invalid(format!(
                        "database.table {:?} is not a plain SQL identifier",
                        database.table
                    )));
                }
            }
            StoreBackend::Redis => {
                if self.redis.is_none() {
                    return Err(ConfigError::Invalid(
                        "store.backend = redis requires [redis]".into(),
                    ));
                }
            }
            StoreBackend::Memory => {
                if self.store.fixture_path.is_none() {
                    return Err(ConfigError::Invalid(
                        "store.backend = memory requires store.fixture_path".into(),
                    ));
                }
            }
        }
        if self.store.timeout_secs == 0 {
            return Err(ConfigError::Invalid("store.timeout_secs must be > 0".into()));
        }
        if self.store.scan_batch_size == 0 {
            return Err(ConfigError::Invalid("store.scan_batch_size must be > 0".into()));
        }
        Ok(())
    }
}

/// 表名只允许 `[A-Za-z_][A-Za-z0-9_]*`，可带一个 schema 前缀
fn is_valid_identifier(name: &str) -> bool {
    let part_ok = |part: &str| {
        let mut chars = part.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    };
    match name.split_once('.') {
        Some((schema, table)) => part_ok(schema) && part_ok(table),
        None => part_ok(name),
    }
}
