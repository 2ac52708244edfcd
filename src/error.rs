//! `WebAuthn` error types
//!
//! Every ceremony step fails with exactly one [`WebAuthnError`]. The variant
//! names the step that rejected the input and carries a message meant for
//! server-side logs; [`WebAuthnError::public_message`] is what end users see.

use thiserror::Error;

/// `WebAuthn` errors that can occur while parsing or verifying a ceremony
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebAuthnError {
    /// Malformed or structurally invalid input data
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// clientDataJSON `type` did not match the ceremony
    #[error("Invalid type: {0}")]
    InvalidType(String),

    /// clientDataJSON challenge did not match the expected challenge
    #[error("Invalid challenge: {0}")]
    InvalidChallenge(String),

    /// clientDataJSON origin is not acceptable for the relying party
    #[error("Invalid origin: {0}")]
    InvalidOrigin(String),

    /// RP ID hash in authenticator data does not match the relying party
    #[error("Invalid relying party: {0}")]
    InvalidRelyingParty(String),

    /// Attestation or assertion signature did not verify
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// COSE or certificate public key is malformed or unsupported
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Attestation certificate does not chain to a trusted root
    #[error("Certificate not trusted: {0}")]
    CertificateNotTrusted(String),

    /// User presence flag required but not set
    #[error("User not present: {0}")]
    UserPresent(String),

    /// User verification flag required but not set
    #[error("User not verified: {0}")]
    UserVerificated(String),

    /// Signature counter did not increase
    #[error("Signature counter: {0}")]
    SignatureCounter(String),

    /// Secure random source unavailable
    #[error("Crypto strong: {0}")]
    CryptoStrong(String),

    /// Out-of-bounds or overflowing buffer read
    #[error("Buffer error: {0}")]
    BufferError(String),

    /// Malformed CBOR
    #[error("CBOR error: {0}")]
    CborError(String),

    /// Android SafetyNet reported the device as not CTS compatible
    #[error("Android not trusted: {0}")]
    AndroidNotTrusted(String),
}

impl WebAuthnError {
    /// Numeric code of the error kind, stable across releases
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::InvalidData(_) => 1,
            Self::InvalidType(_) => 2,
            Self::InvalidChallenge(_) => 3,
            Self::InvalidOrigin(_) => 4,
            Self::InvalidRelyingParty(_) => 5,
            Self::InvalidSignature(_) => 6,
            Self::InvalidPublicKey(_) => 7,
            Self::CertificateNotTrusted(_) => 8,
            Self::UserPresent(_) => 9,
            Self::UserVerificated(_) => 10,
            Self::SignatureCounter(_) => 11,
            Self::CryptoStrong(_) => 13,
            Self::BufferError(_) => 14,
            Self::CborError(_) => 15,
            Self::AndroidNotTrusted(_) => 16,
        }
    }

    /// Detail message without the kind prefix
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::InvalidData(msg)
            | Self::InvalidType(msg)
            | Self::InvalidChallenge(msg)
            | Self::InvalidOrigin(msg)
            | Self::InvalidRelyingParty(msg)
            | Self::InvalidSignature(msg)
            | Self::InvalidPublicKey(msg)
            | Self::CertificateNotTrusted(msg)
            | Self::UserPresent(msg)
            | Self::UserVerificated(msg)
            | Self::SignatureCounter(msg)
            | Self::CryptoStrong(msg)
            | Self::BufferError(msg)
            | Self::CborError(msg)
            | Self::AndroidNotTrusted(msg) => msg,
        }
    }

    /// Generic message for end users
    ///
    /// API layers must return this instead of [`Display`](std::fmt::Display)
    /// output so a failed ceremony never reveals which check rejected it.
    #[must_use]
    #[allow(clippy::unused_self)]
    pub const fn public_message(&self) -> &'static str {
        "authentication failed"
    }

    pub(crate) fn invalid_data(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }

    pub(crate) fn invalid_public_key(msg: impl Into<String>) -> Self {
        Self::InvalidPublicKey(msg.into())
    }

    pub(crate) fn buffer(msg: impl Into<String>) -> Self {
        Self::BufferError(msg.into())
    }

    pub(crate) fn cbor(msg: impl Into<String>) -> Self {
        Self::CborError(msg.into())
    }
}

pub type Result<T, E = WebAuthnError> = std::result::Result<T, E>;
