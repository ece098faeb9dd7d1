//! Redis 连接管理

use redis::Client;
use redis::aio::ConnectionManager;
use warden_errors::{AppError, AppResult};

/// 创建 Redis 连接管理器
pub async fn create_connection_manager(url: &str) -> AppResult<ConnectionManager> {
    let client = Client::open(url)
        .map_err(|e| AppError::config(format!("Invalid Redis URL: {}", e)))?;

    ConnectionManager::new(client).await.map_err(|e| {
        AppError::external_service(format!("Failed to create Redis connection manager: {}", e))
    })
}
