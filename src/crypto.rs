//! `WebAuthn` cryptography operations
//!
//! Public key parsing from PEM/DER, signature verification for the three
//! supported algorithms, hashing and random challenge generation.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ed25519_dalek::Verifier as _;
use p256::pkcs8::DecodePublicKey as _;
use ring::digest;
use ring::rand::SecureRandom;
use sha2::Sha256;

use crate::cose::{CoseAlgorithm, CoseKey};
use crate::error::{Result, WebAuthnError};

/// DER prefix of an Ed25519 `SubjectPublicKeyInfo`, followed by the 32 key bytes
const ED25519_SPKI_PREFIX: [u8; 12] = [
    0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00,
];

/// Verifying key for one of the supported signature algorithms
#[derive(Debug, Clone)]
pub enum PublicKey {
    P256(p256::ecdsa::VerifyingKey),
    Rsa(rsa::RsaPublicKey),
    Ed25519(ed25519_dalek::VerifyingKey),
}

impl PublicKey {
    /// Parse a DER `SubjectPublicKeyInfo`
    ///
    /// # Errors
    /// Returns `InvalidPublicKey` unless the key is P-256, RSA or Ed25519
    pub fn from_der(der: &[u8]) -> Result<Self> {
        if der.len() == ED25519_SPKI_PREFIX.len() + 32 && der.starts_with(&ED25519_SPKI_PREFIX) {
            let mut raw = [0u8; 32];
            raw.copy_from_slice(&der[ED25519_SPKI_PREFIX.len()..]);
            return ed25519_dalek::VerifyingKey::from_bytes(&raw)
                .map(Self::Ed25519)
                .map_err(|e| WebAuthnError::invalid_public_key(format!("Invalid Ed25519 key: {e}")));
        }

        if let Ok(key) = p256::PublicKey::from_public_key_der(der) {
            return Ok(Self::P256(key.into()));
        }

        rsa::RsaPublicKey::from_public_key_der(der)
            .map(Self::Rsa)
            .map_err(|_| WebAuthnError::invalid_public_key("Unsupported or malformed public key"))
    }

    /// Parse a PEM `PUBLIC KEY`
    ///
    /// # Errors
    /// Returns `InvalidPublicKey` if the armor or the key inside is invalid
    pub fn from_pem(pem: &str) -> Result<Self> {
        Self::from_der(&pem_to_der(pem)?)
    }

    /// # Errors
    /// Returns `InvalidPublicKey` if the COSE key material is not a valid key
    pub fn from_cose(key: &CoseKey) -> Result<Self> {
        Self::from_der(&key.to_der())
    }

    #[must_use]
    pub const fn algorithm(&self) -> CoseAlgorithm {
        match self {
            Self::P256(_) => CoseAlgorithm::Es256,
            Self::Rsa(_) => CoseAlgorithm::Rs256,
            Self::Ed25519(_) => CoseAlgorithm::EdDsa,
        }
    }

    /// Verify `signature` over `message`
    ///
    /// ECDSA signatures are DER encoded, RSA signatures are PKCS#1 v1.5 and
    /// Ed25519 signatures are the raw 64 bytes. Hashing with SHA-256 happens
    /// here; `message` is the unhashed signed data.
    ///
    /// # Errors
    /// Returns `InvalidSignature` if the signature is malformed or does not verify
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        let verified = match self {
            Self::P256(key) => p256::ecdsa::Signature::from_der(signature)
                .is_ok_and(|sig| key.verify(message, &sig).is_ok()),
            Self::Rsa(key) => {
                let key = rsa::pkcs1v15::VerifyingKey::<Sha256>::new(key.clone());
                rsa::pkcs1v15::Signature::try_from(signature)
                    .is_ok_and(|sig| key.verify(message, &sig).is_ok())
            }
            Self::Ed25519(key) => ed25519_dalek::Signature::from_slice(signature)
                .is_ok_and(|sig| key.verify(message, &sig).is_ok()),
        };

        if verified {
            Ok(())
        } else {
            Err(WebAuthnError::InvalidSignature(format!(
                "{} signature verification failed",
                self.algorithm().name()
            )))
        }
    }
}

/// Verify a signature with a PEM encoded public key
///
/// # Errors
/// Returns `InvalidSignature` if the key cannot be parsed or the signature
/// does not verify
pub fn verify_pem(pem: &str, message: &[u8], signature: &[u8]) -> Result<()> {
    let key = PublicKey::from_pem(pem).map_err(|e| {
        WebAuthnError::InvalidSignature(format!("Unusable public key: {}", e.message()))
    })?;
    key.verify(message, signature)
}

/// Strip PEM armor and decode the base64 body
///
/// # Errors
/// Returns `InvalidPublicKey` if no armored body is found or it is not base64
pub fn pem_to_der(pem: &str) -> Result<Vec<u8>> {
    let body: String = pem
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("-----"))
        .collect();

    if body.is_empty() {
        return Err(WebAuthnError::invalid_public_key("Empty PEM"));
    }

    STANDARD
        .decode(body)
        .map_err(|e| WebAuthnError::invalid_public_key(format!("Invalid PEM body: {e}")))
}

/// Hash data using SHA-256
#[must_use]
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(digest::digest(&digest::SHA256, data).as_ref());
    out
}

/// Generate `len` bytes from the system CSPRNG
///
/// # Errors
/// Returns `CryptoStrong` if the system random source fails
pub fn random_bytes(len: usize) -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; len];
    ring::rand::SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| WebAuthnError::CryptoStrong("System random source unavailable".to_string()))?;
    Ok(bytes)
}

/// Generate a random challenge
///
/// # Errors
/// Returns `CryptoStrong` if the system random source fails
pub fn generate_challenge(len: usize) -> Result<Vec<u8>> {
    random_bytes(len)
}

/// Generate a user handle
///
/// # Returns
/// 16 random bytes suitable as a `WebAuthn` user ID
///
/// # Errors
/// Returns `CryptoStrong` if the system random source fails
pub fn generate_user_handle() -> Result<Vec<u8>> {
    random_bytes(16)
}
