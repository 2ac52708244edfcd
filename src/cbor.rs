//! CBOR decoding for `WebAuthn`
//!
//! A decoder for the subset of RFC 8949 that authenticators emit: definite
//! length integers, byte and text strings, arrays, maps with integer or text
//! keys, `false`/`true`/`null`, floats, and tags (whose item is returned
//! with the tag discarded). Indefinite lengths and reserved values fail.

use std::collections::BTreeMap;

use crate::buffer::ByteBuffer;
use crate::error::{Result, WebAuthnError};

const MAJOR_UNSIGNED_INT: u8 = 0;
const MAJOR_NEGATIVE_INT: u8 = 1;
const MAJOR_BYTE_STRING: u8 = 2;
const MAJOR_TEXT_STRING: u8 = 3;
const MAJOR_ARRAY: u8 = 4;
const MAJOR_MAP: u8 = 5;
const MAJOR_TAG: u8 = 6;
const MAJOR_FLOAT_SIMPLE: u8 = 7;

/// Nesting limit for arrays, maps and tags
const MAX_DEPTH: usize = 64;

/// Map key: CBOR maps used by `WebAuthn` only key on integers or text
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CborKey {
    Int(i64),
    Text(String),
}

impl CborKey {
    #[must_use]
    pub fn text(key: &str) -> Self {
        Self::Text(key.to_string())
    }
}

impl From<i64> for CborKey {
    fn from(key: i64) -> Self {
        Self::Int(key)
    }
}

impl From<&str> for CborKey {
    fn from(key: &str) -> Self {
        Self::text(key)
    }
}

pub type CborMap = BTreeMap<CborKey, CborValue>;

/// Decoded CBOR data item
#[derive(Debug, Clone, PartialEq)]
pub enum CborValue {
    Unsigned(u64),
    Negative(i64),
    Bytes(Vec<u8>),
    Text(String),
    Array(Vec<CborValue>),
    Map(CborMap),
    Bool(bool),
    Null,
    Float(f64),
}

impl CborValue {
    /// Integer value of an unsigned or negative integer item
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Unsigned(val) => i64::try_from(*val).ok(),
            Self::Negative(val) => Some(*val),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&[CborValue]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_map(&self) -> Option<&CborMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(val) => Some(*val),
            _ => None,
        }
    }

    /// Value under `key` when this item is a map
    #[must_use]
    pub fn get(&self, key: impl Into<CborKey>) -> Option<&CborValue> {
        self.as_map().and_then(|map| map.get(&key.into()))
    }
}

/// CBOR decoder configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct CborDecoder {
    reject_duplicate_keys: bool,
}

impl CborDecoder {
    /// Decoder where a repeated map key overwrites the earlier entry
    #[must_use]
    pub const fn new() -> Self {
        Self {
            reject_duplicate_keys: false,
        }
    }

    /// Decoder that fails on repeated map keys
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            reject_duplicate_keys: true,
        }
    }

    /// Decode exactly one data item spanning the whole input
    ///
    /// # Errors
    /// Returns `CborError` for malformed, truncated or trailing input
    pub fn decode(&self, data: &[u8]) -> Result<CborValue> {
        let buf = ByteBuffer::new(data);
        let mut offset = 0;
        let value = self.parse_item(&buf, &mut offset, 0).map_err(truncated)?;

        if offset != buf.len() {
            return Err(WebAuthnError::cbor("Unused bytes after data item"));
        }

        Ok(value)
    }

    /// Decode one data item starting at `start`, returning it with the
    /// offset just past its last byte
    ///
    /// # Errors
    /// Returns `CborError` for malformed input or an item running past the
    /// end of `data`
    pub fn decode_in_place(&self, data: &[u8], start: usize) -> Result<(CborValue, usize)> {
        let buf = ByteBuffer::new(data);
        let mut offset = start;
        let value = self.parse_item(&buf, &mut offset, 0).map_err(truncated)?;
        Ok((value, offset))
    }

    fn parse_item(&self, buf: &ByteBuffer<'_>, offset: &mut usize, depth: usize) -> Result<CborValue> {
        if depth > MAX_DEPTH {
            return Err(WebAuthnError::cbor("Maximum nesting depth exceeded"));
        }

        let first = buf.byte_at(*offset)?;
        *offset += 1;

        let major = first >> 5;
        let info = first & 0b1_1111;

        if major == MAJOR_FLOAT_SIMPLE {
            return Self::parse_float_simple(info, buf, offset);
        }

        let val = Self::parse_extra_length(info, buf, offset)?;
        self.parse_item_data(major, val, buf, offset, depth)
    }

    fn parse_float_simple(info: u8, buf: &ByteBuffer<'_>, offset: &mut usize) -> Result<CborValue> {
        match info {
            24 => {
                let simple = buf.byte_at(*offset)?;
                *offset += 1;
                Self::parse_simple(simple)
            }
            25 => {
                let val = buf.f16_be(*offset)?;
                *offset += 2;
                Ok(CborValue::Float(val))
            }
            26 => {
                let val = buf.f32_be(*offset)?;
                *offset += 4;
                Ok(CborValue::Float(val))
            }
            27 => {
                let val = buf.f64_be(*offset)?;
                *offset += 8;
                Ok(CborValue::Float(val))
            }
            28..=30 => Err(WebAuthnError::cbor("Reserved value used")),
            31 => Err(WebAuthnError::cbor("Indefinite length is not supported")),
            _ => Self::parse_simple(info),
        }
    }

    fn parse_simple(val: u8) -> Result<CborValue> {
        match val {
            20 => Ok(CborValue::Bool(false)),
            21 => Ok(CborValue::Bool(true)),
            22 => Ok(CborValue::Null),
            _ => Err(WebAuthnError::cbor(format!("Unsupported simple value {val}"))),
        }
    }

    fn parse_extra_length(info: u8, buf: &ByteBuffer<'_>, offset: &mut usize) -> Result<u64> {
        let val = match info {
            0..=23 => u64::from(info),
            24 => {
                let val = u64::from(buf.byte_at(*offset)?);
                *offset += 1;
                val
            }
            25 => {
                let val = u64::from(buf.u16_be(*offset)?);
                *offset += 2;
                val
            }
            26 => {
                let val = u64::from(buf.u32_be(*offset)?);
                *offset += 4;
                val
            }
            27 => {
                let val = buf.u64_be(*offset)?;
                *offset += 8;
                val
            }
            28..=30 => return Err(WebAuthnError::cbor("Reserved value used")),
            _ => return Err(WebAuthnError::cbor("Indefinite length is not supported")),
        };
        Ok(val)
    }

    fn parse_item_data(
        &self,
        major: u8,
        val: u64,
        buf: &ByteBuffer<'_>,
        offset: &mut usize,
        depth: usize,
    ) -> Result<CborValue> {
        match major {
            MAJOR_UNSIGNED_INT => Ok(CborValue::Unsigned(val)),
            MAJOR_NEGATIVE_INT => {
                // u64_be caps val at i64::MAX, so -1 - val cannot overflow
                let val = i64::try_from(val)
                    .map_err(|_| WebAuthnError::cbor("Negative integer out of range"))?;
                Ok(CborValue::Negative(-1 - val))
            }
            MAJOR_BYTE_STRING => {
                let data = Self::read_payload(val, buf, offset)?;
                Ok(CborValue::Bytes(data.to_vec()))
            }
            MAJOR_TEXT_STRING => {
                let data = Self::read_payload(val, buf, offset)?;
                let text = std::str::from_utf8(data)
                    .map_err(|_| WebAuthnError::cbor("Text string is not valid UTF-8"))?;
                Ok(CborValue::Text(text.to_string()))
            }
            MAJOR_ARRAY => self.parse_array(val, buf, offset, depth),
            MAJOR_MAP => self.parse_map(val, buf, offset, depth),
            MAJOR_TAG => self.parse_item(buf, offset, depth + 1),
            _ => Err(WebAuthnError::cbor(format!("Unknown major type {major}"))),
        }
    }

    fn read_payload<'a>(len: u64, buf: &ByteBuffer<'a>, offset: &mut usize) -> Result<&'a [u8]> {
        let len = usize::try_from(len).map_err(|_| WebAuthnError::cbor("Length out of range"))?;
        let data = buf.bytes(*offset, len)?;
        *offset += len;
        Ok(data)
    }

    fn parse_array(
        &self,
        count: u64,
        buf: &ByteBuffer<'_>,
        offset: &mut usize,
        depth: usize,
    ) -> Result<CborValue> {
        let count = usize::try_from(count).map_err(|_| WebAuthnError::cbor("Length out of range"))?;
        // every item takes at least one byte
        let mut items = Vec::with_capacity(count.min(buf.len().saturating_sub(*offset)));
        for _ in 0..count {
            items.push(self.parse_item(buf, offset, depth + 1)?);
        }
        Ok(CborValue::Array(items))
    }

    fn parse_map(
        &self,
        count: u64,
        buf: &ByteBuffer<'_>,
        offset: &mut usize,
        depth: usize,
    ) -> Result<CborValue> {
        let mut map = CborMap::new();

        for _ in 0..count {
            let key = self.parse_item(buf, offset, depth + 1)?;
            let value = self.parse_item(buf, offset, depth + 1)?;

            let key = match key {
                CborValue::Text(text) => CborKey::Text(text),
                other => other
                    .as_integer()
                    .map(CborKey::Int)
                    .ok_or_else(|| {
                        WebAuthnError::cbor("Can only use strings or integers as map keys")
                    })?,
            };

            if map.insert(key, value).is_some() && self.reject_duplicate_keys {
                return Err(WebAuthnError::cbor("Duplicate map key"));
            }
        }

        Ok(CborValue::Map(map))
    }
}

/// Reads past the end or out of range while decoding are CBOR errors
fn truncated(err: WebAuthnError) -> WebAuthnError {
    match err {
        WebAuthnError::BufferError(msg) => {
            WebAuthnError::cbor(format!("Malformed CBOR data: {msg}"))
        }
        other => other,
    }
}

/// Decode one item spanning all of `data` with the default decoder
///
/// # Errors
/// See [`CborDecoder::decode`]
pub fn decode(data: &[u8]) -> Result<CborValue> {
    CborDecoder::new().decode(data)
}

/// Decode one item at `start` with the default decoder
///
/// # Errors
/// See [`CborDecoder::decode_in_place`]
pub fn decode_in_place(data: &[u8], start: usize) -> Result<(CborValue, usize)> {
    CborDecoder::new().decode_in_place(data, start)
}
