//! Order-preserving byte encoding of physical keys
//!
//! ## Layout
//! ```text
//! ┌──────────────────────────────┬─────────┬──────────────────┐
//! │ namespace (escaped, 0x00 end)│ tag (1) │ value body       │
//! └──────────────────────────────┴─────────┴──────────────────┘
//! ```
//!
//! Namespace escaping: `0x00 → 0x01 0x01`, `0x01 → 0x01 0x02`. The terminator
//! keeps `users` keys from sharing a prefix with `users_by_email` keys.
//!
//! Value bodies compare bytewise in the same order as the values:
//! - Int:   `i64 ^ sign bit`, big-endian
//! - Float: IEEE-754 sortable transform, big-endian
//! - Text / Bytes: raw bytes (the value is always the last component)

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{IndexKvError, Result};
use crate::value::Value;

const TERMINATOR_BYTE: u8 = 0x00;
const ESCAPE_BYTE: u8 = 0x01;

const TAG_NULL: u8 = 0x00;
const TAG_BOOL: u8 = 0x10;
const TAG_INT: u8 = 0x20;
const TAG_FLOAT: u8 = 0x30;
const TAG_TEXT: u8 = 0x40;
const TAG_BYTES: u8 = 0x50;

const SIGN_BIT: u64 = 0x8000_0000_0000_0000;

/// Encode the namespace part only (the `list` prefix of a namespace)
pub fn encode_namespace(namespace: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(namespace.len() + 1);
    put_namespace(namespace, &mut buf);
    buf.freeze()
}

/// Encode a full `(namespace, value)` key
pub fn encode_key(namespace: &str, value: &Value) -> Bytes {
    let mut buf = BytesMut::with_capacity(namespace.len() + 10);
    put_namespace(namespace, &mut buf);
    put_value(value, &mut buf);
    buf.freeze()
}

/// Decode a full key back to `(namespace, value)`
pub fn decode_key(bytes: &[u8]) -> Result<(String, Value)> {
    let mut buf = bytes;
    let namespace = take_namespace(&mut buf)?;
    let value = take_value(buf)?;
    Ok((namespace, value))
}

fn put_namespace(namespace: &str, buf: &mut BytesMut) {
    for &byte in namespace.as_bytes() {
        match byte {
            TERMINATOR_BYTE => {
                buf.put_u8(ESCAPE_BYTE);
                buf.put_u8(0x01);
            }
            ESCAPE_BYTE => {
                buf.put_u8(ESCAPE_BYTE);
                buf.put_u8(0x02);
            }
            _ => buf.put_u8(byte),
        }
    }
    buf.put_u8(TERMINATOR_BYTE);
}

fn put_value(value: &Value, buf: &mut BytesMut) {
    match value {
        Value::Null => buf.put_u8(TAG_NULL),
        Value::Bool(b) => {
            buf.put_u8(TAG_BOOL);
            buf.put_u8(u8::from(*b));
        }
        Value::Int(i) => {
            buf.put_u8(TAG_INT);
            buf.put_u64((*i as u64) ^ SIGN_BIT);
        }
        Value::Float(x) => {
            buf.put_u8(TAG_FLOAT);
            let bits = x.to_bits();
            let sortable = if bits & SIGN_BIT != 0 {
                !bits
            } else {
                bits ^ SIGN_BIT
            };
            buf.put_u64(sortable);
        }
        Value::Text(s) => {
            buf.put_u8(TAG_TEXT);
            buf.put_slice(s.as_bytes());
        }
        Value::Bytes(b) => {
            buf.put_u8(TAG_BYTES);
            buf.put_slice(b);
        }
    }
}

fn take_namespace(buf: &mut &[u8]) -> Result<String> {
    let mut raw = Vec::new();
    let mut i = 0;

    while i < buf.len() {
        match buf[i] {
            TERMINATOR_BYTE => {
                *buf = &buf[i + 1..];
                return String::from_utf8(raw)
                    .map_err(|e| IndexKvError::Encoding(format!("namespace is not utf-8: {}", e)));
            }
            ESCAPE_BYTE => {
                match buf.get(i + 1) {
                    Some(0x01) => raw.push(TERMINATOR_BYTE),
                    Some(0x02) => raw.push(ESCAPE_BYTE),
                    Some(other) => {
                        return Err(IndexKvError::Encoding(format!(
                            "invalid escape sequence: 0x01 0x{:02x}",
                            other
                        )))
                    }
                    None => {
                        return Err(IndexKvError::Encoding(
                            "truncated escape sequence in namespace".to_string(),
                        ))
                    }
                }
                i += 2;
            }
            byte => {
                raw.push(byte);
                i += 1;
            }
        }
    }

    Err(IndexKvError::Encoding(
        "unterminated namespace (missing 0x00 terminator)".to_string(),
    ))
}

fn take_value(buf: &[u8]) -> Result<Value> {
    let (&tag, body) = buf
        .split_first()
        .ok_or_else(|| IndexKvError::Encoding("missing value tag".to_string()))?;

    match tag {
        TAG_NULL if body.is_empty() => Ok(Value::Null),
        TAG_BOOL if body.len() == 1 => Ok(Value::Bool(body[0] != 0)),
        TAG_INT => Ok(Value::Int((read_u64(body)? ^ SIGN_BIT) as i64)),
        TAG_FLOAT => {
            let sortable = read_u64(body)?;
            let bits = if sortable & SIGN_BIT != 0 {
                sortable ^ SIGN_BIT
            } else {
                !sortable
            };
            Ok(Value::Float(f64::from_bits(bits)))
        }
        TAG_TEXT => String::from_utf8(body.to_vec())
            .map(Value::Text)
            .map_err(|e| IndexKvError::Encoding(format!("text key is not utf-8: {}", e))),
        TAG_BYTES => Ok(Value::Bytes(body.to_vec())),
        other => Err(IndexKvError::Encoding(format!(
            "unknown value tag 0x{:02x} ({} body bytes)",
            other,
            body.len()
        ))),
    }
}

fn read_u64(body: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = body.try_into().map_err(|_| {
        IndexKvError::Encoding(format!("expected 8 value bytes, got {}", body.len()))
    })?;
    Ok(u64::from_be_bytes(bytes))
}
