//! Redis 过期键值存储
//!
//! 扫描用 `SCAN ... MATCH`，每页再用 `MGET` + `PTTL` 取值和剩余寿命，
//! 换算成绝对过期时间。删除是一条多键 `DEL`，本身就是原子的。

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt, stream};
use redis::aio::ConnectionManager;
use tracing::debug;
use warden_errors::{AppError, AppResult};
use warden_ports::{CacheStore, EntryStream, KeyPattern, RawCacheEntry};

/// PTTL: 键不存在
const PTTL_MISSING: i64 = -2;
/// PTTL: 键没有过期时间
const PTTL_PERSISTENT: i64 = -1;

/// Redis Cache Store
pub struct RedisCacheStore {
    conn: ConnectionManager,
    key_prefix: String,
    scan_count: usize,
}

impl RedisCacheStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            key_prefix: String::new(),
            scan_count: 500,
        }
    }

    /// 设置物理键前缀
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// 设置 SCAN 的 COUNT 提示
    pub fn with_scan_count(mut self, count: usize) -> Self {
        self.scan_count = count.max(1);
        self
    }

    /// 发一次 PING，确认服务端可达
    pub async fn ping(&self) -> AppResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| AppError::external_service(format!("Redis PING failed: {}", e)))?;
        Ok(())
    }
}

/// 游标扫描状态，cursor 为 None 表示已经扫完
struct ScanState {
    conn: ConnectionManager,
    glob: String,
    key_prefix: String,
    count: usize,
    cursor: Option<u64>,
}

async fn next_page(mut state: ScanState) -> AppResult<Option<(Vec<RawCacheEntry>, ScanState)>> {
    let Some(cursor) = state.cursor else {
        return Ok(None);
    };

    let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
        .arg(cursor)
        .arg("MATCH")
        .arg(&state.glob)
        .arg("COUNT")
        .arg(state.count)
        .query_async(&mut state.conn)
        .await
        .map_err(|e| AppError::external_service(format!("Redis scan failed: {}", e)))?;

    state.cursor = (next != 0).then_some(next);
    debug!(glob = %state.glob, cursor, keys = keys.len(), "Redis scan page");

    let entries = load_entries(&mut state.conn, &state.key_prefix, keys).await?;
    Ok(Some((entries, state)))
}

async fn load_entries(
    conn: &mut ConnectionManager,
    key_prefix: &str,
    keys: Vec<String>,
) -> AppResult<Vec<RawCacheEntry>> {
    if keys.is_empty() {
        return Ok(Vec::new());
    }

    let values: Vec<Option<Vec<u8>>> = redis::cmd("MGET")
        .arg(&keys)
        .query_async(conn)
        .await
        .map_err(|e| AppError::external_service(format!("Redis mget failed: {}", e)))?;

    let mut pipe = redis::pipe();
    for key in &keys {
        pipe.cmd("PTTL").arg(key);
    }
    let ttls: Vec<i64> = pipe
        .query_async(conn)
        .await
        .map_err(|e| AppError::external_service(format!("Redis pttl failed: {}", e)))?;

    let now_ms = chrono::Utc::now().timestamp_millis();
    let entries = keys
        .into_iter()
        .zip(values)
        .zip(ttls)
        .filter_map(|((key, value), pttl)| {
            // SCAN 之后被删掉或过期的键直接跳过
            let value = value?;
            let expires_at = match pttl {
                PTTL_MISSING => return None,
                PTTL_PERSISTENT => None,
                ms => Some((now_ms + ms + 999) / 1000),
            };
            let key = match key.strip_prefix(key_prefix) {
                Some(logical) => logical.to_string(),
                None => key,
            };
            Some(RawCacheEntry::new(key, value, expires_at))
        })
        .collect();

    Ok(entries)
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn scan(&self, pattern: &KeyPattern) -> AppResult<EntryStream> {
        let state = ScanState {
            conn: self.conn.clone(),
            glob: pattern.with_key_prefix(&self.key_prefix).to_glob(),
            key_prefix: self.key_prefix.clone(),
            count: self.scan_count,
            cursor: Some(0),
        };

        let entries = stream::try_unfold(state, next_page)
            .map_ok(|page| stream::iter(page.into_iter().map(Ok)))
            .try_flatten();

        Ok(entries.boxed())
    }

    async fn delete_many(&self, keys: &[String]) -> AppResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }

        let physical: Vec<String> = keys
            .iter()
            .map(|key| format!("{}{}", self.key_prefix, key))
            .collect();

        let mut conn = self.conn.clone();
        let removed: u64 = redis::cmd("DEL")
            .arg(&physical)
            .query_async(&mut conn)
            .await
            .map_err(|e| AppError::external_service(format!("Redis delete failed: {}", e)))?;

        debug!(requested = keys.len(), removed, "Redis batch delete");
        Ok(removed)
    }
}
