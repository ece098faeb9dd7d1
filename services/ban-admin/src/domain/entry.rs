//! 审计条目

use std::borrow::Cow;

use chrono::{DateTime, SecondsFormat};
use serde::Serialize;
use warden_ports::{DecodedValue, RawCacheEntry, ValueDecoder};

use crate::domain::key::{EntryKind, ParsedKey};

/// 没有过期时间时展示的占位符
pub const NO_EXPIRY_MARKER: &str = "N/A";

/// 解码后的一条存储记录
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub key: String,
    pub parsed: ParsedKey,
    pub value: DecodedValue,
    pub expires_at: Option<i64>,
    /// 扫描时已逻辑过期（仅在显式要求时才会出现在报告里）
    pub expired: bool,
}

impl AuditEntry {
    pub fn from_raw(raw: RawCacheEntry, decoder: &dyn ValueDecoder, now: i64) -> Self {
        let expired = raw.is_expired_at(now);
        let expires_at = raw.expiry();
        Self {
            parsed: ParsedKey::parse(&raw.key),
            value: decoder.decode(&raw.value),
            key: raw.key,
            expires_at,
            expired,
        }
    }

    pub fn kind(&self) -> EntryKind {
        self.parsed.kind()
    }

    /// 排序键：没有过期时间的按 0 处理，排在最前
    pub fn sort_key(&self) -> i64 {
        self.expires_at.unwrap_or(0)
    }

    /// ISO-8601 UTC 时间；超出可表示范围时退回原始秒数
    pub fn expires_at_iso(&self) -> Option<String> {
        self.expires_at.map(|secs| {
            DateTime::from_timestamp(secs, 0)
                .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
                .unwrap_or_else(|| secs.to_string())
        })
    }

    /// 文本报告中的一行：类型、IP、端点、过期时间、值，以制表符分隔
    ///
    /// IP、端点和值里的控制字符会被转义，保证一条记录只占一行、列数固定。
    pub fn render_line(&self) -> String {
        let mut expires = self
            .expires_at_iso()
            .unwrap_or_else(|| NO_EXPIRY_MARKER.to_string());
        if self.expired {
            expires.push_str(" (expired)");
        }
        format!(
            "{}\t{}\t{}\t{}\t{}",
            self.kind(),
            escape_field(self.parsed.ip().unwrap_or_default()),
            escape_field(self.parsed.endpoint().unwrap_or_default()),
            expires,
            escape_field(&self.value.to_string())
        )
    }

    pub fn view(&self) -> AuditEntryView<'_> {
        AuditEntryView {
            key: &self.key,
            kind: self.kind(),
            ip: self.parsed.ip(),
            endpoint: self.parsed.endpoint(),
            expires_at: self.expires_at,
            expires_at_iso: self.expires_at_iso(),
            expired: self.expired,
            value: &self.value,
        }
    }
}

/// 把控制字符（`\n`、`\r`、`\t` 等）写成转义序列
fn escape_field(field: &str) -> Cow<'_, str> {
    if !field.chars().any(char::is_control) {
        return Cow::Borrowed(field);
    }
    let mut escaped = String::with_capacity(field.len() + 8);
    for c in field.chars() {
        if c.is_control() {
            escaped.extend(c.escape_default());
        } else {
            escaped.push(c);
        }
    }
    Cow::Owned(escaped)
}

/// JSON 输出结构
#[derive(Debug, Serialize)]
pub struct AuditEntryView<'a> {
    pub key: &'a str,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub ip: Option<&'a str>,
    pub endpoint: Option<&'a str>,
    pub expires_at: Option<i64>,
    pub expires_at_iso: Option<String>,
    pub expired: bool,
    pub value: &'a DecodedValue,
}
