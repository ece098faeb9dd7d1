//! 管理操作流程测试
//!
//! 覆盖：
//! - 审计列表的排序、空结果、畸形键
//! - 解封的精确匹配、幂等、零删除调用
//! - 存储故障时的错误传播

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use ban_admin::application::{AuditLister, ListOptions, NO_ACTIVE_ENTRIES, Revoker};
use ban_admin::domain::EntryKind;
use ban_admin::infrastructure::MemoryCacheStore;
use futures::{StreamExt, stream};
use warden_errors::{AppError, AppResult};
use warden_ports::{CacheStore, EntryStream, KeyPattern};

fn render(lines: &ban_admin::application::AuditReport) -> String {
    let mut out = Vec::new();
    lines.render_text(&mut out).unwrap();
    String::from_utf8(out).unwrap()
}

// ============================================================================
// 审计列表
// ============================================================================

#[tokio::test]
async fn test_list_orders_missing_expiry_first() {
    let store = MemoryCacheStore::new();
    store.insert("banned:198.51.100.3", b"true".to_vec(), Some(300));
    store.insert("banned:198.51.100.1", b"true".to_vec(), Some(100));
    store.insert("strikes:search:198.51.100.0", b"2".to_vec(), None);
    store.insert("ratelimit:login:198.51.100.2", b"9".to_vec(), Some(200));

    let report = AuditLister::new(Arc::new(store))
        .list_at(10, ListOptions::default())
        .await
        .unwrap();

    let ips: Vec<_> = report
        .entries
        .iter()
        .map(|e| e.parsed.ip().unwrap().to_string())
        .collect();
    assert_eq!(
        ips,
        vec!["198.51.100.0", "198.51.100.1", "198.51.100.2", "198.51.100.3"]
    );

    let text = render(&report);
    let first = text.lines().next().unwrap();
    assert_eq!(first, "strikes\t198.51.100.0\tsearch\tN/A\t2");
    assert_eq!(text.lines().count(), 4);
}

#[tokio::test]
async fn test_list_empty_store() {
    let report = AuditLister::new(Arc::new(MemoryCacheStore::new()))
        .list_active()
        .await
        .unwrap();
    assert_eq!(render(&report), format!("{}\n", NO_ACTIVE_ENTRIES));
}

#[tokio::test]
async fn test_list_keeps_malformed_strike_key() {
    let store = MemoryCacheStore::new();
    store.insert("strikes:search", b"1".to_vec(), None);

    let report = AuditLister::new(Arc::new(store)).list_active().await.unwrap();
    assert_eq!(report.entries.len(), 1);
    assert_eq!(report.entries[0].kind(), EntryKind::Strikes);
    assert_eq!(report.entries[0].parsed.ip(), None);
    assert_eq!(report.entries[0].parsed.endpoint(), None);
}

// ============================================================================
// 解封
// ============================================================================

#[tokio::test]
async fn test_unban_scenario() {
    let store = Arc::new(MemoryCacheStore::new());
    store.insert("banned:10.0.0.5", b"true".to_vec(), None);
    store.insert("strikes:search:10.0.0.5", b"3".to_vec(), None);
    store.insert("ratelimit:login:10.0.0.5", b"20".to_vec(), None);
    store.insert("strikes:search:10.0.0.9", b"1".to_vec(), None);

    let revoker = Revoker::new(store.clone());
    let first = revoker.unban("10.0.0.5").await.unwrap();
    assert_eq!(first.removed, 3);
    assert!(store.contains_key("strikes:search:10.0.0.9"));

    let second = revoker.unban("10.0.0.5").await.unwrap();
    assert_eq!(second.removed, 0);
    assert_eq!(store.delete_calls(), 1);

    // 解封后审计列表只剩无关条目
    let report = AuditLister::new(store.clone()).list_active().await.unwrap();
    assert_eq!(report.entries.len(), 1);
    assert_eq!(report.entries[0].parsed.ip(), Some("10.0.0.9"));
}

#[tokio::test]
async fn test_unban_unknown_ip_makes_no_delete_call() {
    let store = Arc::new(MemoryCacheStore::new());
    store.insert("banned:10.0.0.5", b"true".to_vec(), None);

    let outcome = Revoker::new(store.clone()).unban("203.0.113.1").await.unwrap();
    assert_eq!(outcome.removed, 0);
    assert_eq!(outcome.to_string(), "No cache entries found for 203.0.113.1");
    assert_eq!(store.delete_calls(), 0);
}

// ============================================================================
// 存储故障
// ============================================================================

/// 扫描到一半失败的存储
struct FlakyStore {
    delete_calls: AtomicUsize,
}

#[async_trait]
impl CacheStore for FlakyStore {
    async fn scan(&self, _pattern: &KeyPattern) -> AppResult<EntryStream> {
        let items: Vec<AppResult<warden_ports::RawCacheEntry>> = vec![
            Ok(warden_ports::RawCacheEntry::new("banned:10.0.0.5", b"true".to_vec(), None)),
            Err(AppError::database("connection reset by peer")),
        ];
        Ok(stream::iter(items).boxed())
    }

    async fn delete_many(&self, _keys: &[String]) -> AppResult<u64> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        Err(AppError::database("should not be reached"))
    }
}

#[tokio::test]
async fn test_scan_failure_aborts_listing() {
    let store = Arc::new(FlakyStore {
        delete_calls: AtomicUsize::new(0),
    });
    let err = AuditLister::new(store).list_active().await.unwrap_err();
    assert!(err.is_store_failure());
    assert_ne!(err.exit_code(), 0);
}

#[tokio::test]
async fn test_scan_failure_aborts_unban_before_delete() {
    let store = Arc::new(FlakyStore {
        delete_calls: AtomicUsize::new(0),
    });
    let err = Revoker::new(store.clone()).unban("10.0.0.5").await.unwrap_err();
    assert!(matches!(err, AppError::Database(_)));
    assert_eq!(store.delete_calls.load(Ordering::SeqCst), 0);
}
