//! 进程内存储
//!
//! 与真实后端语义一致：过期条目不会被主动清理，扫描时照样返回。
//! 用于测试，以及从 JSON fixture 加载数据做演练。

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::{StreamExt, stream};
use parking_lot::RwLock;
use serde::Deserialize;
use warden_errors::{AppError, AppResult};
use warden_ports::{CacheStore, EntryStream, KeyPattern, RawCacheEntry};

#[derive(Debug, Clone)]
struct StoredValue {
    value: Vec<u8>,
    expires_at: Option<i64>,
}

/// fixture 文件中的一条记录，值按 JSON 序列化后存储
#[derive(Debug, Deserialize)]
struct FixtureEntry {
    key: String,
    value: serde_json::Value,
    expires_at: Option<i64>,
}

/// 内存存储
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    data: RwLock<HashMap<String, StoredValue>>,
    /// 下一次批量删除前先消失的键，模拟扫描与删除之间的自然过期
    vanishing: RwLock<HashSet<String>>,
    delete_calls: AtomicUsize,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 JSON fixture 加载：`[{"key": "...", "value": ..., "expires_at": 123}]`
    pub fn from_fixture(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::config(format!("Failed to read fixture {}: {}", path.display(), e))
        })?;
        let entries: Vec<FixtureEntry> = serde_json::from_str(&content).map_err(|e| {
            AppError::config(format!("Invalid fixture {}: {}", path.display(), e))
        })?;

        let store = Self::new();
        for entry in entries {
            let value = serde_json::to_vec(&entry.value)
                .map_err(|e| AppError::internal(format!("Failed to encode fixture value: {}", e)))?;
            store.insert(entry.key, value, entry.expires_at);
        }
        Ok(store)
    }

    pub fn insert(&self, key: impl Into<String>, value: Vec<u8>, expires_at: Option<i64>) {
        self.data
            .write()
            .insert(key.into(), StoredValue { value, expires_at });
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// `delete_many` 被调用的次数
    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn expire_on_next_delete(&self, key: impl Into<String>) {
        self.vanishing.write().insert(key.into());
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn scan(&self, pattern: &KeyPattern) -> AppResult<EntryStream> {
        let snapshot: Vec<AppResult<RawCacheEntry>> = self
            .data
            .read()
            .iter()
            .filter(|(key, _)| pattern.matches(key))
            .map(|(key, stored)| {
                Ok(RawCacheEntry::new(
                    key.clone(),
                    stored.value.clone(),
                    stored.expires_at,
                ))
            })
            .collect();

        Ok(stream::iter(snapshot).boxed())
    }

    async fn delete_many(&self, keys: &[String]) -> AppResult<u64> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);

        let mut data = self.data.write();
        for key in self.vanishing.write().drain() {
            data.remove(&key);
        }

        let removed = keys.iter().filter(|key| data.remove(*key).is_some()).count();
        Ok(removed as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    #[tokio::test]
    async fn test_scan_returns_expired_entries_too() {
        let store = MemoryCacheStore::new();
        store.insert("banned:1.1.1.1", b"true".to_vec(), Some(1));
        store.insert("banned:2.2.2.2", b"true".to_vec(), None);

        let entries: Vec<_> = store
            .scan(&KeyPattern::prefix("banned:"))
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_noop() {
        let store = MemoryCacheStore::new();
        store.insert("banned:1.1.1.1", b"true".to_vec(), None);

        let removed = store
            .delete_many(&["banned:1.1.1.1".into(), "banned:9.9.9.9".into()])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(store.is_empty());
        assert_eq!(store.delete_calls(), 1);
    }

    #[test]
    fn test_fixture_loading() {
        let path = std::env::temp_dir().join(format!("ban-admin-fixture-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"[
                {"key": "banned:10.0.0.5", "value": true, "expires_at": 4000000000},
                {"key": "strikes:search:10.0.0.5", "value": 3, "expires_at": null}
            ]"#,
        )
        .unwrap();

        let store = MemoryCacheStore::from_fixture(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(store.len(), 2);
        assert!(store.contains_key("strikes:search:10.0.0.5"));
    }

    #[test]
    fn test_fixture_errors_are_config_errors() {
        let missing = Path::new("/nonexistent/ban-admin/fixture.json");
        let err = MemoryCacheStore::from_fixture(missing).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
