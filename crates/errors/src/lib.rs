//! warden-errors - 统一错误处理
//!
//! 所有库 crate 共用的错误类型，并提供到进程退出码的映射

use thiserror::Error;

/// 应用错误类型
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    pub fn external_service(msg: impl Into<String>) -> Self {
        Self::ExternalService(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// 是否为存储不可用类错误（数据库、Redis、超时）
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::ExternalService(_) | Self::Timeout(_)
        )
    }

    /// 转换为进程退出码（sysexits 约定）
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 65,
            Self::Database(_) => 69,
            Self::ExternalService(_) => 69,
            Self::Internal(_) => 70,
            Self::Io(_) => 74,
            Self::Timeout(_) => 75,
            Self::Config(_) => 78,
        }
    }
}

/// Result 类型别名
pub type AppResult<T> = Result<T, AppError>;
