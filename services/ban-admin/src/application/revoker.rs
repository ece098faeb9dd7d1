//! 解封
//!
//! 找出引用某个 IP 的全部条目（封禁、各端点的 strike 与限流窗口），一次批量删除。
//!
//! 扫描和删除之间不持有任何锁：在这期间被写入方重新写入的条目可能漏删，
//! 这是已知的竞态。报告的数量以存储返回的实际删除数为准。

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use futures::TryStreamExt;
use tracing::{debug, info, warn};
use warden_errors::AppResult;
use warden_ports::{CacheStore, KeyPattern};

use crate::domain::{BANNED_NAMESPACE, ParsedKey, RATELIMIT_NAMESPACE, STRIKES_NAMESPACE};

/// 解封结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnbanOutcome {
    pub ip: String,
    /// 扫描到的键
    pub matched: Vec<String>,
    /// 存储实际删除的数量
    pub removed: u64,
    pub dry_run: bool,
}

impl fmt::Display for UnbanOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.matched.is_empty() {
            write!(f, "No cache entries found for {}", self.ip)
        } else if self.dry_run {
            write!(f, "Would remove {} cache entries for {}", self.matched.len(), self.ip)
        } else {
            write!(f, "Removed {} cache entries for {}", self.removed, self.ip)
        }
    }
}

/// 某个 IP 对应的三个扫描模式：`banned:<ip>`、`strikes:*:<ip>`、`ratelimit:*:<ip>`
pub fn patterns_for(ip: &str) -> [KeyPattern; 3] {
    let per_endpoint = |namespace: &str| {
        KeyPattern::default()
            .then_literal(format!("{}:", namespace))
            .then_any()
            .then_literal(format!(":{}", ip))
    };
    [
        KeyPattern::exact(format!("{}:{}", BANNED_NAMESPACE, ip)),
        per_endpoint(STRIKES_NAMESPACE),
        per_endpoint(RATELIMIT_NAMESPACE),
    ]
}

/// 解封服务
pub struct Revoker {
    store: Arc<dyn CacheStore>,
}

impl Revoker {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// 删除引用该 IP 的全部条目
    pub async fn unban(&self, ip: &str) -> AppResult<UnbanOutcome> {
        self.revoke(ip, false).await
    }

    /// 只扫描不删除
    pub async fn preview(&self, ip: &str) -> AppResult<UnbanOutcome> {
        self.revoke(ip, true).await
    }

    async fn revoke(&self, ip: &str, dry_run: bool) -> AppResult<UnbanOutcome> {
        let matched = self.find_keys(ip).await?;

        if matched.is_empty() {
            info!(ip = %ip, "No cache entries found");
            return Ok(UnbanOutcome {
                ip: ip.to_string(),
                matched,
                removed: 0,
                dry_run,
            });
        }

        if dry_run {
            info!(ip = %ip, matched = matched.len(), "Dry run, nothing deleted");
            return Ok(UnbanOutcome {
                ip: ip.to_string(),
                matched,
                removed: 0,
                dry_run,
            });
        }

        let removed = self.store.delete_many(&matched).await?;
        if removed < matched.len() as u64 {
            warn!(
                ip = %ip,
                matched = matched.len(),
                removed,
                "Some entries disappeared between scan and delete"
            );
        }

        metrics::counter!("ban_admin_entries_removed_total").increment(removed);
        info!(ip = %ip, removed, "Revoked cache entries");

        Ok(UnbanOutcome {
            ip: ip.to_string(),
            matched,
            removed,
            dry_run,
        })
    }

    /// 扫描三个模式，只保留解析出的 IP 与目标完全一致的键
    async fn find_keys(&self, ip: &str) -> AppResult<Vec<String>> {
        let mut keys = BTreeSet::new();

        for pattern in patterns_for(ip) {
            let mut stream = self.store.scan(&pattern).await?;
            while let Some(entry) = stream.try_next().await? {
                if ParsedKey::parse(&entry.key).ip() == Some(ip) {
                    keys.insert(entry.key);
                } else {
                    debug!(key = %entry.key, "Pattern matched but IP differs, skipping");
                }
            }
        }

        Ok(keys.into_iter().collect())
    }
}
