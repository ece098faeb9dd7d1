//! 审计列表
//!
//! 扫描 `banned:` / `strikes:` / `ratelimit:` 三个命名空间，解码、按过期时间
//! 排序后生成报告。只读，不加锁，得到的是某一时刻的（可能稍旧的）视图。

use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Arc;

use futures::TryStreamExt;
use tracing::{debug, info};
use warden_errors::AppResult;
use warden_ports::{CacheStore, KeyPattern, RawCacheEntry};

use crate::domain::{AuditEntry, AuditEntryView, EntryKind};

/// 没有任何条目时输出的唯一一行
pub const NO_ACTIVE_ENTRIES: &str = "(no active entries)";

/// 列表选项
#[derive(Debug, Clone, Copy, Default)]
pub struct ListOptions {
    /// 同时展示已逻辑过期但尚未清理的条目
    pub include_expired: bool,
}

/// 审计报告
#[derive(Debug, Clone, Default)]
pub struct AuditReport {
    pub entries: Vec<AuditEntry>,
    /// 因已过期而被略过的条目数
    pub expired_skipped: usize,
}

impl AuditReport {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 文本格式：每条一行，空报告只有一行占位符
    pub fn render_text<W: Write>(&self, out: &mut W) -> io::Result<()> {
        if self.entries.is_empty() {
            return writeln!(out, "{}", NO_ACTIVE_ENTRIES);
        }
        for entry in &self.entries {
            writeln!(out, "{}", entry.render_line())?;
        }
        Ok(())
    }

    /// JSON 格式：对象数组，空报告为 `[]`
    pub fn render_json<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let views: Vec<AuditEntryView<'_>> = self.entries.iter().map(AuditEntry::view).collect();
        serde_json::to_writer_pretty(&mut *out, &views)?;
        writeln!(out)
    }
}

/// 审计列表服务
pub struct AuditLister {
    store: Arc<dyn CacheStore>,
}

impl AuditLister {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// 列出当前仍有效的条目
    pub async fn list_active(&self) -> AppResult<AuditReport> {
        self.list(ListOptions::default()).await
    }

    pub async fn list(&self, options: ListOptions) -> AppResult<AuditReport> {
        self.list_at(chrono::Utc::now().timestamp(), options).await
    }

    /// 以 `now`（Unix 秒）为基准判断过期
    pub async fn list_at(&self, now: i64, options: ListOptions) -> AppResult<AuditReport> {
        let raw = self.scan_audited().await?;
        let decoder = self.store.decoder();

        let mut expired_skipped = 0;
        let mut entries: Vec<AuditEntry> = raw
            .into_values()
            .filter_map(|raw| {
                if raw.is_expired_at(now) && !options.include_expired {
                    expired_skipped += 1;
                    return None;
                }
                Some(AuditEntry::from_raw(raw, decoder, now))
            })
            .collect();

        entries.sort_by(|a, b| {
            a.sort_key()
                .cmp(&b.sort_key())
                .then_with(|| a.key.cmp(&b.key))
        });

        metrics::gauge!("ban_admin_entries_listed").set(entries.len() as f64);
        info!(
            entries = entries.len(),
            expired_skipped, "Listed ban cache entries"
        );

        Ok(AuditReport {
            entries,
            expired_skipped,
        })
    }

    /// 三个前缀各扫一次，按键去重
    async fn scan_audited(&self) -> AppResult<HashMap<String, RawCacheEntry>> {
        let mut seen = HashMap::new();

        for kind in EntryKind::AUDITED {
            let Some(namespace) = kind.namespace() else {
                continue;
            };
            let pattern = KeyPattern::prefix(format!("{}:", namespace));
            let mut stream = self.store.scan(&pattern).await?;
            let mut scanned = 0usize;
            while let Some(entry) = stream.try_next().await? {
                scanned += 1;
                seen.entry(entry.key.clone()).or_insert(entry);
            }
            debug!(pattern = %pattern, scanned, "Scanned namespace");
        }

        Ok(seen)
    }
}
