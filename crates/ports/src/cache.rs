//! 过期键值存储 trait 定义

use async_trait::async_trait;
use futures::stream::BoxStream;
use warden_errors::AppResult;

use crate::pattern::KeyPattern;
use crate::value::{CacheValueDecoder, ValueDecoder};

/// 存储中的一条原始记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCacheEntry {
    /// 逻辑键（已去掉物理前缀）
    pub key: String,
    /// 未解码的值
    pub value: Vec<u8>,
    /// 过期时间（Unix 秒），None 或 0 表示永不过期
    pub expires_at: Option<i64>,
}

impl RawCacheEntry {
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>, expires_at: Option<i64>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            expires_at,
        }
    }

    /// 归一化后的过期时间，0 视为永不过期
    pub fn expiry(&self) -> Option<i64> {
        self.expires_at.filter(|t| *t != 0)
    }

    /// 在 `now` 时刻是否已逻辑过期
    pub fn is_expired_at(&self, now: i64) -> bool {
        matches!(self.expiry(), Some(t) if now >= t)
    }
}

/// 扫描结果：惰性、有限、不可重放
pub type EntryStream = BoxStream<'static, AppResult<RawCacheEntry>>;

static PLAIN_DECODER: CacheValueDecoder = CacheValueDecoder::plain();

/// 过期键值存储
///
/// 扫描可能返回已逻辑过期但尚未清理的记录，调用方需要自行判断。
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// 按模式扫描，不保证顺序
    async fn scan(&self, pattern: &KeyPattern) -> AppResult<EntryStream>;

    /// 按精确键批量删除，返回实际删除的数量
    ///
    /// 单次调用是原子的：要么全部删除，要么返回错误且什么都没删
    async fn delete_many(&self, keys: &[String]) -> AppResult<u64>;

    /// 该存储使用的值解码器
    fn decoder(&self) -> &dyn ValueDecoder {
        &PLAIN_DECODER
    }
}
