//! RedisCacheStore 集成测试
//!
//! 需要真实的 Redis：`REDIS_URL=redis://127.0.0.1:6379 cargo test -- --ignored`

use futures::TryStreamExt;
use redis::AsyncCommands;
use std::env;
use warden_adapter_redis::{RedisCacheStore, create_connection_manager};
use warden_ports::{CacheStore, KeyPattern};

async fn store_with_prefix(prefix: &str) -> (RedisCacheStore, redis::aio::ConnectionManager) {
    let redis_url = env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    let conn = create_connection_manager(&redis_url)
        .await
        .expect("Failed to create Redis connection manager");
    let store = RedisCacheStore::new(conn.clone())
        .with_key_prefix(prefix)
        .with_scan_count(10);
    (store, conn)
}

#[tokio::test]
#[ignore]
async fn test_scan_strips_prefix_and_reads_ttl() {
    let prefix = "warden-test-scan:";
    let (store, mut conn) = store_with_prefix(prefix).await;

    let _: () = conn
        .set_ex(format!("{prefix}banned:10.9.9.1"), "true", 120)
        .await
        .unwrap();
    let _: () = conn.set(format!("{prefix}strikes:login:10.9.9.1"), "2").await.unwrap();

    let mut entries: Vec<_> = store
        .scan(&KeyPattern::prefix(""))
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    entries.sort_by(|a, b| a.key.cmp(&b.key));

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].key, "banned:10.9.9.1");
    assert!(entries[0].expires_at.is_some());
    assert_eq!(entries[1].key, "strikes:login:10.9.9.1");
    assert_eq!(entries[1].expires_at, None);

    let removed = store
        .delete_many(&["banned:10.9.9.1".into(), "strikes:login:10.9.9.1".into()])
        .await
        .unwrap();
    assert_eq!(removed, 2);
}

#[tokio::test]
#[ignore]
async fn test_delete_missing_keys_is_noop() {
    let (store, _) = store_with_prefix("warden-test-missing:").await;
    let removed = store
        .delete_many(&["banned:203.0.113.1".into()])
        .await
        .unwrap();
    assert_eq!(removed, 0);
}

#[tokio::test]
#[ignore]
async fn test_ping_reaches_server() {
    let (store, _conn) = store_with_prefix("warden-test-ping:").await;
    store.ping().await.expect("PING should succeed against a live server");
}
