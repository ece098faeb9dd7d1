//! 键语法
//!
//! | 命名空间    | 键形状                      |
//! |-------------|-----------------------------|
//! | `banned`    | `banned:<ip>`               |
//! | `strikes`   | `strikes:<endpoint>:<ip>`   |
//! | `ratelimit` | `ratelimit:<endpoint>:<ip>` |
//!
//! 解析是全函数：段数不够的键仍保留类型，字段为空；未知命名空间
//! 原样保留为 `Unknown`。IP 取最后一个固定段之后的全部内容，
//! 因此带冒号的 IPv6 地址也能完整解析。

use std::fmt;

use serde::Serialize;

pub const BANNED_NAMESPACE: &str = "banned";
pub const STRIKES_NAMESPACE: &str = "strikes";
pub const RATELIMIT_NAMESPACE: &str = "ratelimit";

/// 条目类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Banned,
    Strikes,
    RateLimit,
    Unknown,
}

impl EntryKind {
    /// 审计时扫描的三个命名空间
    pub const AUDITED: [EntryKind; 3] = [Self::Banned, Self::Strikes, Self::RateLimit];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Banned => BANNED_NAMESPACE,
            Self::Strikes => STRIKES_NAMESPACE,
            Self::RateLimit => RATELIMIT_NAMESPACE,
            Self::Unknown => "unknown",
        }
    }

    /// 对应的键命名空间，Unknown 没有
    pub fn namespace(&self) -> Option<&'static str> {
        match self {
            Self::Unknown => None,
            known => Some(known.as_str()),
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 解析后的键
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedKey {
    Banned {
        ip: Option<String>,
    },
    Strikes {
        endpoint: Option<String>,
        ip: Option<String>,
    },
    RateLimit {
        endpoint: Option<String>,
        ip: Option<String>,
    },
    Unknown {
        raw: String,
    },
}

impl ParsedKey {
    /// 解析键，永不失败
    pub fn parse(key: &str) -> Self {
        let (namespace, rest) = match key.split_once(':') {
            Some((namespace, rest)) => (namespace, Some(rest)),
            None => (key, None),
        };

        let endpoint_and_ip = || {
            rest.and_then(|rest| rest.split_once(':'))
                .map(|(endpoint, ip)| (Some(endpoint.to_string()), Some(ip.to_string())))
                .unwrap_or((None, None))
        };

        match namespace {
            BANNED_NAMESPACE => Self::Banned {
                ip: rest.map(str::to_string),
            },
            STRIKES_NAMESPACE => {
                let (endpoint, ip) = endpoint_and_ip();
                Self::Strikes { endpoint, ip }
            }
            RATELIMIT_NAMESPACE => {
                let (endpoint, ip) = endpoint_and_ip();
                Self::RateLimit { endpoint, ip }
            }
            _ => Self::Unknown {
                raw: key.to_string(),
            },
        }
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            Self::Banned { .. } => EntryKind::Banned,
            Self::Strikes { .. } => EntryKind::Strikes,
            Self::RateLimit { .. } => EntryKind::RateLimit,
            Self::Unknown { .. } => EntryKind::Unknown,
        }
    }

    pub fn ip(&self) -> Option<&str> {
        match self {
            Self::Banned { ip } | Self::Strikes { ip, .. } | Self::RateLimit { ip, .. } => {
                ip.as_deref()
            }
            Self::Unknown { .. } => None,
        }
    }

    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::Strikes { endpoint, .. } | Self::RateLimit { endpoint, .. } => {
                endpoint.as_deref()
            }
            Self::Banned { .. } | Self::Unknown { .. } => None,
        }
    }

    /// 渲染为规范键；字段缺失（畸形键）时返回 None
    pub fn to_key(&self) -> Option<String> {
        match self {
            Self::Banned { ip: Some(ip) } => Some(format!("{BANNED_NAMESPACE}:{ip}")),
            Self::Strikes {
                endpoint: Some(endpoint),
                ip: Some(ip),
            } => Some(format!("{STRIKES_NAMESPACE}:{endpoint}:{ip}")),
            Self::RateLimit {
                endpoint: Some(endpoint),
                ip: Some(ip),
            } => Some(format!("{RATELIMIT_NAMESPACE}:{endpoint}:{ip}")),
            Self::Unknown { raw } => Some(raw.clone()),
            _ => None,
        }
    }
}

/// 解析键
pub fn parse_key(key: &str) -> ParsedKey {
    ParsedKey::parse(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_banned() {
        let parsed = parse_key("banned:10.0.0.5");
        assert_eq!(parsed.kind(), EntryKind::Banned);
        assert_eq!(parsed.ip(), Some("10.0.0.5"));
        assert_eq!(parsed.endpoint(), None);
    }

    #[test]
    fn test_parse_strikes_and_ratelimit() {
        let strikes = parse_key("strikes:search:10.0.0.5");
        assert_eq!(
            strikes,
            ParsedKey::Strikes {
                endpoint: Some("search".into()),
                ip: Some("10.0.0.5".into()),
            }
        );

        let ratelimit = parse_key("ratelimit:login:10.0.0.5");
        assert_eq!(ratelimit.kind(), EntryKind::RateLimit);
        assert_eq!(ratelimit.endpoint(), Some("login"));
        assert_eq!(ratelimit.ip(), Some("10.0.0.5"));
    }

    #[test]
    fn test_malformed_keys_keep_type() {
        let strikes = parse_key("strikes:search");
        assert_eq!(strikes.kind(), EntryKind::Strikes);
        assert_eq!(strikes.endpoint(), None);
        assert_eq!(strikes.ip(), None);
        assert_eq!(strikes.to_key(), None);

        let ratelimit = parse_key("ratelimit");
        assert_eq!(ratelimit.kind(), EntryKind::RateLimit);
        assert_eq!(ratelimit.ip(), None);

        let banned = parse_key("banned");
        assert_eq!(banned, ParsedKey::Banned { ip: None });
    }

    #[test]
    fn test_unknown_namespace_is_preserved() {
        let parsed = parse_key("session:abc:def");
        assert_eq!(parsed.kind(), EntryKind::Unknown);
        assert_eq!(parsed.ip(), None);
        assert_eq!(parsed.endpoint(), None);
        assert_eq!(parsed.to_key().as_deref(), Some("session:abc:def"));

        assert_eq!(parse_key("").kind(), EntryKind::Unknown);
        // 命名空间区分大小写
        assert_eq!(parse_key("BANNED:1.2.3.4").kind(), EntryKind::Unknown);
    }

    #[test]
    fn test_ipv6_addresses_stay_whole() {
        let banned = parse_key("banned:2001:db8::1");
        assert_eq!(banned.ip(), Some("2001:db8::1"));

        let strikes = parse_key("strikes:login:2001:db8::1");
        assert_eq!(strikes.endpoint(), Some("login"));
        assert_eq!(strikes.ip(), Some("2001:db8::1"));
    }

    #[test]
    fn test_well_formed_keys_round_trip() {
        let keys = [
            "banned:10.0.0.5",
            "banned:2001:db8::1",
            "strikes:search:10.0.0.5",
            "ratelimit:login:203.0.113.1",
            "ratelimit:api-v2:::1",
            "banned:",
        ];
        for key in keys {
            let parsed = parse_key(key);
            assert_eq!(parsed.kind().as_str(), key.split(':').next().unwrap());
            assert_eq!(parsed.to_key().as_deref(), Some(key), "{key}");
        }
    }

    #[test]
    fn test_kind_serializes_as_namespace() {
        assert_eq!(serde_json::to_string(&EntryKind::RateLimit).unwrap(), "\"ratelimit\"");
        assert_eq!(serde_json::to_string(&EntryKind::Unknown).unwrap(), "\"unknown\"");
        assert_eq!(EntryKind::Unknown.namespace(), None);
        assert_eq!(EntryKind::Strikes.namespace(), Some("strikes"));
    }
}
