//! Bounds-checked binary reader
//!
//! [`ByteBuffer`] is a read-only view over a byte slice. Every read takes an
//! absolute offset and fails with [`WebAuthnError::BufferError`] instead of
//! panicking when the read would leave the buffer.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, URL_SAFE_NO_PAD};
use base64::engine::DecodePaddingMode;
use base64::Engine;

use crate::error::{Result, WebAuthnError};

/// Base64url engine that accepts input with or without `=` padding
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Read-only cursor over a borrowed byte slice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteBuffer<'a> {
    data: &'a [u8],
}

impl<'a> ByteBuffer<'a> {
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub const fn as_slice(&self) -> &'a [u8] {
        self.data
    }

    /// Borrow `len` bytes starting at `offset`
    ///
    /// # Errors
    /// Returns `BufferError` if `offset + len` exceeds the buffer length
    pub fn bytes(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        let end = offset
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| {
                WebAuthnError::buffer(format!(
                    "Invalid offset or length: {offset} + {len} exceeds {}",
                    self.data.len()
                ))
            })?;
        Ok(&self.data[offset..end])
    }

    fn array<const N: usize>(&self, offset: usize) -> Result<[u8; N]> {
        let slice = self.bytes(offset, N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    /// # Errors
    /// Returns `BufferError` if `offset` is out of bounds
    pub fn byte_at(&self, offset: usize) -> Result<u8> {
        self.data
            .get(offset)
            .copied()
            .ok_or_else(|| WebAuthnError::buffer(format!("Invalid offset: {offset}")))
    }

    /// # Errors
    /// Returns `BufferError` if fewer than 2 bytes remain at `offset`
    pub fn u16_be(&self, offset: usize) -> Result<u16> {
        self.array(offset).map(u16::from_be_bytes)
    }

    /// Big-endian 32-bit read, restricted to values that fit a signed 32-bit integer
    ///
    /// # Errors
    /// Returns `BufferError` if out of bounds or if the top bit is set
    pub fn u32_be(&self, offset: usize) -> Result<u32> {
        let val = self.array(offset).map(u32::from_be_bytes)?;
        if val & 0x8000_0000 != 0 {
            return Err(WebAuthnError::buffer("Value out of integer range"));
        }
        Ok(val)
    }

    /// Big-endian 64-bit read, restricted to values that fit a signed 64-bit integer
    ///
    /// # Errors
    /// Returns `BufferError` if out of bounds or if the sign bit would be set
    pub fn u64_be(&self, offset: usize) -> Result<u64> {
        let val = self.array(offset).map(u64::from_be_bytes)?;
        if val & 0x8000_0000_0000_0000 != 0 {
            return Err(WebAuthnError::buffer("Value out of integer range"));
        }
        Ok(val)
    }

    /// IEEE 754 half precision, decoded as in RFC 8949 Appendix D
    ///
    /// # Errors
    /// Returns `BufferError` if fewer than 2 bytes remain at `offset`
    pub fn f16_be(&self, offset: usize) -> Result<f64> {
        let half = self.u16_be(offset)?;
        let exp = i32::from((half >> 10) & 0x1f);
        let mant = f64::from(half & 0x3ff);

        let val = match exp {
            0 => mant * 2f64.powi(-24),
            31 if half & 0x3ff == 0 => f64::INFINITY,
            31 => f64::NAN,
            _ => (mant + 1024.0) * 2f64.powi(exp - 25),
        };

        Ok(if half & 0x8000 == 0 { val } else { -val })
    }

    /// # Errors
    /// Returns `BufferError` if fewer than 4 bytes remain at `offset`
    pub fn f32_be(&self, offset: usize) -> Result<f64> {
        self.array(offset).map(|b| f64::from(f32::from_be_bytes(b)))
    }

    /// # Errors
    /// Returns `BufferError` if fewer than 8 bytes remain at `offset`
    pub fn f64_be(&self, offset: usize) -> Result<f64> {
        self.array(offset).map(f64::from_be_bytes)
    }

    /// Lowercase hex rendering of the whole buffer
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.data)
    }

    /// Byte-exact comparison
    #[must_use]
    pub fn equals(&self, other: &[u8]) -> bool {
        self.data == other
    }

    /// Base64url without padding (RFC 4648 section 5)
    #[must_use]
    pub fn to_base64url(data: &[u8]) -> String {
        URL_SAFE_NO_PAD.encode(data)
    }

    /// Decode base64url, tolerating `=` padding
    ///
    /// # Errors
    /// Returns `InvalidData` if the input is not valid base64url
    pub fn from_base64url(encoded: &str) -> Result<Vec<u8>> {
        URL_SAFE_LENIENT
            .decode(encoded.trim())
            .map_err(|e| WebAuthnError::invalid_data(format!("Invalid base64url: {e}")))
    }

    /// Decode base64url that must not carry padding
    ///
    /// # Errors
    /// Returns `InvalidData` if the input is padded or otherwise invalid
    pub fn from_base64url_strict(encoded: &str) -> Result<Vec<u8>> {
        URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|e| WebAuthnError::invalid_data(format!("Invalid base64url: {e}")))
    }

    /// Number of `=` characters a base64 encoding of this length needs
    #[must_use]
    pub const fn padding_len(encoded_len: usize) -> usize {
        (4 - encoded_len % 4) % 4
    }
}

impl<'a> From<&'a [u8]> for ByteBuffer<'a> {
    fn from(data: &'a [u8]) -> Self {
        Self::new(data)
    }
}

impl AsRef<[u8]> for ByteBuffer<'_> {
    fn as_ref(&self) -> &[u8] {
        self.data
    }
}
