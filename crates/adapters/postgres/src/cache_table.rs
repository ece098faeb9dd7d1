//! 数据库缓存表
//!
//! 表结构（列名与常见的数据库缓存后端一致）：
//!
//! ```sql
//! CREATE TABLE cache_table (
//!     cache_key VARCHAR(255) PRIMARY KEY,
//!     value     TEXT NOT NULL,
//!     expires   TIMESTAMPTZ
//! );
//! ```
//!
//! 值以 base64 文本保存；过期时间用 `EXTRACT(EPOCH ...)` 转成秒，
//! 所以 `TIMESTAMP` 和 `TIMESTAMPTZ` 两种列类型都能读。

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt, stream};
use sqlx::PgPool;
use tracing::debug;
use warden_errors::{AppError, AppResult};
use warden_ports::{
    CacheStore, CacheValueDecoder, EntryStream, KeyPattern, RawCacheEntry, ValueDecoder,
};

type Row = (String, Option<String>, Option<i64>);

/// 基于 PostgreSQL 表的过期键值存储
pub struct PgCacheTable {
    pool: PgPool,
    table: String,
    key_prefix: String,
    batch_size: i64,
    decoder: CacheValueDecoder,
}

impl PgCacheTable {
    /// `table` 必须是已校验过的 SQL 标识符，会被直接拼进语句
    pub fn new(pool: PgPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
            key_prefix: String::new(),
            batch_size: 500,
            decoder: CacheValueDecoder::base64_wrapped(),
        }
    }

    /// 设置物理键前缀（如 `:1:`）
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// 设置每页行数
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = i64::try_from(batch_size.max(1)).unwrap_or(i64::MAX);
        self
    }

    /// 确认连接可用且缓存表存在
    pub async fn check_table(&self) -> AppResult<()> {
        sqlx::query(&check_sql(&self.table))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::database(format!("Cache table {} is not readable: {}", self.table, e))
            })?;
        Ok(())
    }
}

fn check_sql(table: &str) -> String {
    format!("SELECT 1 FROM {table} LIMIT 1")
}

fn scan_sql(table: &str) -> String {
    format!(
        r"SELECT cache_key, value, CAST(EXTRACT(EPOCH FROM expires) AS BIGINT)
          FROM {table}
          WHERE cache_key LIKE $1 ESCAPE '\'
            AND ($2::TEXT IS NULL OR cache_key > $2)
          ORDER BY cache_key
          LIMIT $3"
    )
}

fn delete_sql(table: &str) -> String {
    format!("DELETE FROM {table} WHERE cache_key = ANY($1)")
}

/// 键集分页状态，`done` 之后不再查询
struct PageState {
    pool: PgPool,
    sql: String,
    like: String,
    key_prefix: String,
    batch_size: i64,
    last_key: Option<String>,
    done: bool,
}

async fn next_page(mut state: PageState) -> AppResult<Option<(Vec<RawCacheEntry>, PageState)>> {
    if state.done {
        return Ok(None);
    }

    let rows: Vec<Row> = sqlx::query_as(&state.sql)
        .bind(&state.like)
        .bind(state.last_key.as_deref())
        .bind(state.batch_size)
        .fetch_all(&state.pool)
        .await
        .map_err(|e| AppError::database(format!("Cache table scan failed: {}", e)))?;

    debug!(like = %state.like, rows = rows.len(), "Cache table scan page");

    state.done = (rows.len() as i64) < state.batch_size;
    state.last_key = rows.last().map(|(key, _, _)| key.clone());

    let entries = rows
        .into_iter()
        .map(|(key, value, expires)| {
            let key = match key.strip_prefix(state.key_prefix.as_str()) {
                Some(logical) => logical.to_string(),
                None => key,
            };
            RawCacheEntry::new(key, value.unwrap_or_default(), expires)
        })
        .collect();

    Ok(Some((entries, state)))
}

#[async_trait]
impl CacheStore for PgCacheTable {
    async fn scan(&self, pattern: &KeyPattern) -> AppResult<EntryStream> {
        let state = PageState {
            pool: self.pool.clone(),
            sql: scan_sql(&self.table),
            like: pattern.with_key_prefix(&self.key_prefix).to_like(),
            key_prefix: self.key_prefix.clone(),
            batch_size: self.batch_size,
            last_key: None,
            done: false,
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

        // 单条 DELETE 语句在 PostgreSQL 中是原子的
        let result = sqlx::query(&delete_sql(&self.table))
            .bind(physical)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Cache table delete failed: {}", e)))?;

        debug!(requested = keys.len(), removed = result.rows_affected(), "Cache table batch delete");
        Ok(result.rows_affected())
    }

    fn decoder(&self) -> &dyn ValueDecoder {
        &self.decoder
    }
}
