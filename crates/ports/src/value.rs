//! 值解码
//!
//! 存储中的值对核心逻辑是不透明的，只需要能展示。解码尽力而为，
//! 失败时保留原始字节。

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Serialize, Serializer};

use crate::pickle;

/// 解码后的值
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DecodedValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Json(serde_json::Value),
    /// 无法识别的格式，保留原始字节
    Raw(#[serde(serialize_with = "serialize_raw")] Vec<u8>),
}

impl DecodedValue {
    pub fn is_raw(&self) -> bool {
        matches!(self, Self::Raw(_))
    }

    fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => Self::Int(i),
                (None, Some(f)) => Self::Float(f),
                (None, None) => Self::Json(serde_json::Value::Number(n)),
            },
            serde_json::Value::String(s) => Self::Text(s),
            other => Self::Json(other),
        }
    }
}

fn raw_display(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => format!("0x{}", hex::encode(bytes)),
    }
}

fn serialize_raw<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&raw_display(bytes))
}

impl fmt::Display for DecodedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Text(s) => f.write_str(s),
            Self::Json(v) => write!(f, "{}", v),
            Self::Raw(bytes) => f.write_str(&raw_display(bytes)),
        }
    }
}

/// 值解码器
pub trait ValueDecoder: Send + Sync {
    /// 解码失败时必须返回 `DecodedValue::Raw`，不能报错
    fn decode(&self, blob: &[u8]) -> DecodedValue;
}

/// 默认解码器：pickle 标量 -> JSON -> 原始字节
///
/// 表存储会把二进制值以 base64 文本保存，`base64_wrapped` 时先尝试解开一层。
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheValueDecoder {
    base64_wrapped: bool,
}

impl CacheValueDecoder {
    pub const fn plain() -> Self {
        Self {
            base64_wrapped: false,
        }
    }

    pub const fn base64_wrapped() -> Self {
        Self {
            base64_wrapped: true,
        }
    }

    fn decode_payload(bytes: &[u8]) -> Option<DecodedValue> {
        pickle::decode_scalar(bytes).or_else(|| {
            serde_json::from_slice::<serde_json::Value>(bytes)
                .ok()
                .map(DecodedValue::from_json)
        })
    }
}

impl ValueDecoder for CacheValueDecoder {
    fn decode(&self, blob: &[u8]) -> DecodedValue {
        if self.base64_wrapped {
            let unwrapped = STANDARD
                .decode(blob.trim_ascii())
                .ok()
                .and_then(|bytes| Self::decode_payload(&bytes));
            if let Some(value) = unwrapped {
                return value;
            }
        }
        Self::decode_payload(blob).unwrap_or_else(|| DecodedValue::Raw(blob.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_scalars() {
        let decoder = CacheValueDecoder::plain();
        assert_eq!(decoder.decode(b"5"), DecodedValue::Int(5));
        assert_eq!(decoder.decode(b"true"), DecodedValue::Bool(true));
        assert_eq!(decoder.decode(b"1.5"), DecodedValue::Float(1.5));
        assert_eq!(decoder.decode(b"\"hi\""), DecodedValue::Text("hi".into()));
        assert_eq!(decoder.decode(b"null"), DecodedValue::Null);
    }

    #[test]
    fn test_json_structures() {
        let decoder = CacheValueDecoder::plain();
        let value = decoder.decode(br#"{"count":3,"window":60}"#);
        assert_eq!(value.to_string(), r#"{"count":3,"window":60}"#);
    }

    #[test]
    fn test_pickle_payload() {
        let decoder = CacheValueDecoder::plain();
        assert_eq!(decoder.decode(b"\x80\x05\x88."), DecodedValue::Bool(true));
        assert_eq!(decoder.decode(b"\x80\x04K\x03."), DecodedValue::Int(3));
    }

    #[test]
    fn test_base64_wrapped_pickle() {
        let decoder = CacheValueDecoder::base64_wrapped();
        assert_eq!(decoder.decode(b"gAWILg=="), DecodedValue::Bool(true));
    }

    #[test]
    fn test_base64_wrapper_falls_through_to_json() {
        // "true" 也是合法的 base64，但解出来不是任何已知格式
        let decoder = CacheValueDecoder::base64_wrapped();
        assert_eq!(decoder.decode(b"true"), DecodedValue::Bool(true));
        assert_eq!(decoder.decode(b"7"), DecodedValue::Int(7));
    }

    #[test]
    fn test_corrupt_value_falls_back_to_raw() {
        let decoder = CacheValueDecoder::plain();
        let value = decoder.decode(b"\x80\x05\xff\xfe garbage");
        assert!(value.is_raw());
        assert_eq!(value.to_string(), format!("0x{}", hex::encode(b"\x80\x05\xff\xfe garbage")));

        let text = decoder.decode(b"not json");
        assert_eq!(text, DecodedValue::Raw(b"not json".to_vec()));
        assert_eq!(text.to_string(), "not json");
    }

    #[test]
    fn test_serialize_untagged() {
        assert_eq!(serde_json::to_string(&DecodedValue::Int(3)).unwrap(), "3");
        assert_eq!(serde_json::to_string(&DecodedValue::Null).unwrap(), "null");
        assert_eq!(
            serde_json::to_string(&DecodedValue::Raw(b"abc".to_vec())).unwrap(),
            "\"abc\""
        );
    }
}
