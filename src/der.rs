//! Minimal DER encoding
//!
//! Just enough ASN.1 DER to wrap raw public key material in a
//! `SubjectPublicKeyInfo` and armor it as PEM.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

const TAG_INTEGER: u8 = 0x02;
const TAG_BIT_STRING: u8 = 0x03;
const TAG_NULL: u8 = 0x05;
const TAG_OID: u8 = 0x06;
const TAG_SEQUENCE: u8 = 0x30;

const PEM_LINE_WIDTH: usize = 64;

/// Encode a DER length: short form below 128, long form otherwise
#[must_use]
pub fn length(len: usize) -> Vec<u8> {
    if len < 0x80 {
        // short form fits in the low seven bits
        #[allow(clippy::cast_possible_truncation)]
        return vec![len as u8];
    }

    let bytes = len.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
    let significant = &bytes[first..];

    let mut out = Vec::with_capacity(significant.len() + 1);
    #[allow(clippy::cast_possible_truncation)]
    out.push(0x80 | significant.len() as u8);
    out.extend_from_slice(significant);
    out
}

/// Tag, length and value
pub(crate) fn tlv(tag: u8, contents: &[u8]) -> Vec<u8> {
    let len = length(contents.len());
    let mut out = Vec::with_capacity(1 + len.len() + contents.len());
    out.push(tag);
    out.extend_from_slice(&len);
    out.extend_from_slice(contents);
    out
}

#[must_use]
pub fn sequence(contents: &[u8]) -> Vec<u8> {
    tlv(TAG_SEQUENCE, contents)
}

/// Object identifier from its already-encoded content bytes
#[must_use]
pub fn oid(encoded: &[u8]) -> Vec<u8> {
    tlv(TAG_OID, encoded)
}

/// Bit string with zero unused bits
#[must_use]
pub fn bit_string(bytes: &[u8]) -> Vec<u8> {
    let mut contents = Vec::with_capacity(bytes.len() + 1);
    contents.push(0x00);
    contents.extend_from_slice(bytes);
    tlv(TAG_BIT_STRING, &contents)
}

#[must_use]
pub fn null() -> Vec<u8> {
    vec![TAG_NULL, 0x00]
}

/// Non-negative INTEGER from big-endian magnitude bytes
///
/// Leading zeros are stripped (keeping at least one byte) and a zero byte is
/// prepended when the high bit is set.
#[must_use]
pub fn unsigned_integer(bytes: &[u8]) -> Vec<u8> {
    let first = bytes
        .iter()
        .position(|b| *b != 0)
        .unwrap_or_else(|| bytes.len().saturating_sub(1));
    let trimmed = bytes.get(first..).unwrap_or_default();

    let mut contents = Vec::with_capacity(trimmed.len() + 1);
    match trimmed.first() {
        None => contents.push(0x00),
        Some(b) if b & 0x80 != 0 => {
            contents.push(0x00);
            contents.extend_from_slice(trimmed);
        }
        Some(_) => contents.extend_from_slice(trimmed),
    }
    tlv(TAG_INTEGER, &contents)
}

/// PEM armor with base64 body wrapped at 64 columns
#[must_use]
pub fn pem(label: &str, der: &[u8]) -> String {
    let encoded = STANDARD.encode(der);
    let mut out = format!("-----BEGIN {label}-----\n");

    // base64 output is ASCII so byte chunks are valid str boundaries
    for line in encoded.as_bytes().chunks(PEM_LINE_WIDTH) {
        out.push_str(&String::from_utf8_lossy(line));
        out.push('\n');
    }

    out.push_str(&format!("-----END {label}-----\n"));
    out
}
