//! 存储装配
//!
//! 根据配置打开对应后端，返回显式的存储句柄。句柄在命令结束时随作用域释放。

use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use tracing::info;
use warden_adapter_postgres::{PgCacheTable, PostgresConfig, create_pool};
use warden_adapter_redis::{RedisCacheStore, create_connection_manager};
use warden_common::{RetryConfig, with_retry};
use warden_config::{AppConfig, RetrySettings, StoreBackend};
use warden_errors::{AppError, AppResult};
use warden_ports::CacheStore;

use crate::infrastructure::MemoryCacheStore;

fn retry_config(settings: &RetrySettings) -> RetryConfig {
    RetryConfig::new(
        settings.max_attempts,
        Duration::from_millis(settings.initial_delay_ms),
        Duration::from_millis(settings.max_delay_ms),
    )
}

/// 打开配置中选定的存储
pub async fn open_store(config: &AppConfig) -> AppResult<Arc<dyn CacheStore>> {
    let retry = retry_config(&config.retry);

    match config.store.backend {
        StoreBackend::Postgres => {
            let database = config
                .database
                .as_ref()
                .ok_or_else(|| AppError::config("store.backend = postgres requires [database]"))?;
            let pg_config = PostgresConfig::new(database.url.expose_secret())
                .with_max_connections(database.max_connections);
            let store = with_retry(&retry, "PostgreSQL cache table", || {
                let cfg = pg_config.clone();
                async move {
                    let pool = create_pool(&cfg).await?;
                    let store = PgCacheTable::new(pool, database.table.clone())
                        .with_key_prefix(database.key_prefix.clone())
                        .with_batch_size(config.store.scan_batch_size);
                    store.check_table().await?;
                    Ok::<_, AppError>(store)
                }
            })
            .await?;
            info!(table = %database.table, "PostgreSQL cache table opened");
            Ok(Arc::new(store))
        }
        StoreBackend::Redis => {
            let redis = config
                .redis
                .as_ref()
                .ok_or_else(|| AppError::config("store.backend = redis requires [redis]"))?;
            let store = with_retry(&retry, "Redis connection", || {
                let url = redis.url.expose_secret().clone();
                async move {
                    let conn = create_connection_manager(&url).await?;
                    let store = RedisCacheStore::new(conn)
                        .with_key_prefix(redis.key_prefix.clone())
                        .with_scan_count(config.store.scan_batch_size);
                    store.ping().await?;
                    Ok::<_, AppError>(store)
                }
            })
            .await?;
            info!("Redis connection verified");
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            let path = config
                .store
                .fixture_path
                .as_deref()
                .ok_or_else(|| AppError::config("store.backend = memory requires store.fixture_path"))?;
            let store = MemoryCacheStore::from_fixture(path)?;
            info!(path = %path.display(), entries = store.len(), "Memory store loaded from fixture");
            Ok(Arc::new(store))
        }
    }
}
