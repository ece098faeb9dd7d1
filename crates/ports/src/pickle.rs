//! 只读的 pickle 标量解码
//!
//! 只识别协议 2 及以上、内容为单个标量（None / bool / int / float / str）
//! 的 payload。其他任何情况返回 None，由调用方回退到原始字节。

use crate::value::DecodedValue;

const PROTO: u8 = 0x80;
const FRAME: u8 = 0x95;
const MEMOIZE: u8 = 0x94;
const STOP: u8 = b'.';
const NONE: u8 = b'N';
const NEWTRUE: u8 = 0x88;
const NEWFALSE: u8 = 0x89;
const BININT: u8 = b'J';
const BININT1: u8 = b'K';
const BININT2: u8 = b'M';
const LONG1: u8 = 0x8a;
const BINFLOAT: u8 = b'G';
const SHORT_BINUNICODE: u8 = 0x8c;
const BINUNICODE: u8 = b'X';

struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn byte(&mut self) -> Option<u8> {
        let (&first, rest) = self.buf.split_first()?;
        self.buf = rest;
        Some(first)
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.buf.len() < n {
            return None;
        }
        let (head, rest) = self.buf.split_at(n);
        self.buf = rest;
        Some(head)
    }

    fn array<const N: usize>(&mut self) -> Option<[u8; N]> {
        self.take(N)?.try_into().ok()
    }
}

pub(crate) fn decode_scalar(bytes: &[u8]) -> Option<DecodedValue> {
    let mut reader = Reader { buf: bytes };

    if reader.byte()? != PROTO || reader.byte()? < 2 {
        return None;
    }

    let mut op = reader.byte()?;
    if op == FRAME {
        reader.take(8)?;
        op = reader.byte()?;
    }

    let value = match op {
        NONE => DecodedValue::Null,
        NEWTRUE => DecodedValue::Bool(true),
        NEWFALSE => DecodedValue::Bool(false),
        BININT1 => DecodedValue::Int(i64::from(reader.byte()?)),
        BININT2 => DecodedValue::Int(i64::from(u16::from_le_bytes(reader.array()?))),
        BININT => DecodedValue::Int(i64::from(i32::from_le_bytes(reader.array()?))),
        LONG1 => {
            let len = usize::from(reader.byte()?);
            DecodedValue::Int(long_from_le(reader.take(len)?)?)
        }
        BINFLOAT => DecodedValue::Float(f64::from_be_bytes(reader.array()?)),
        SHORT_BINUNICODE => {
            let len = usize::from(reader.byte()?);
            DecodedValue::Text(std::str::from_utf8(reader.take(len)?).ok()?.to_string())
        }
        BINUNICODE => {
            let len = u32::from_le_bytes(reader.array()?) as usize;
            DecodedValue::Text(std::str::from_utf8(reader.take(len)?).ok()?.to_string())
        }
        _ => return None,
    };

    let mut tail = reader.byte()?;
    if tail == MEMOIZE {
        tail = reader.byte()?;
    }
    (tail == STOP && reader.buf.is_empty()).then_some(value)
}

/// 小端补码整数，超过 8 字节返回 None
fn long_from_le(bytes: &[u8]) -> Option<i64> {
    if bytes.is_empty() {
        return Some(0);
    }
    if bytes.len() > 8 {
        return None;
    }
    let negative = bytes[bytes.len() - 1] & 0x80 != 0;
    let mut buf = if negative { [0xff; 8] } else { [0; 8] };
    buf[..bytes.len()].copy_from_slice(bytes);
    Some(i64::from_le_bytes(buf))
}
