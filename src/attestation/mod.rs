//! Attestation objects and attestation statement formats
//!
//! An attestation object is the CBOR map `{fmt, attStmt, authData}` returned
//! by `navigator.credentials.create()`. The format name selects one of the
//! statement types below; unknown or disallowed names are rejected before
//! any statement parsing happens.

mod android_key;
mod android_safetynet;
mod apple;
mod fido_u2f;
mod none;
mod packed;
mod tpm;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::authenticator_data::AuthenticatorData;
use crate::cbor::{self, CborKey, CborMap, CborValue};
use crate::certificate::{self, Certificate, RootCertificates};
use crate::cose::CoseAlgorithm;
use crate::error::{Result, WebAuthnError};

pub use android_key::AndroidKeyStatement;
pub use android_safetynet::AndroidSafetyNetStatement;
pub use apple::AppleStatement;
pub use fido_u2f::FidoU2fStatement;
pub use packed::PackedStatement;
pub use tpm::TpmStatement;

/// Attestation statement format identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AttestationFormat {
    AndroidKey,
    AndroidSafetyNet,
    Apple,
    FidoU2f,
    None,
    Packed,
    Tpm,
}

impl AttestationFormat {
    pub const ALL: [Self; 7] = [
        Self::AndroidKey,
        Self::AndroidSafetyNet,
        Self::Apple,
        Self::FidoU2f,
        Self::None,
        Self::Packed,
        Self::Tpm,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::AndroidKey => "android-key",
            Self::AndroidSafetyNet => "android-safetynet",
            Self::Apple => "apple",
            Self::FidoU2f => "fido-u2f",
            Self::None => "none",
            Self::Packed => "packed",
            Self::Tpm => "tpm",
        }
    }
}

impl fmt::Display for AttestationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AttestationFormat {
    type Err = WebAuthnError;

    fn from_str(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|format| format.name() == name)
            .ok_or_else(|| WebAuthnError::invalid_data(format!("Unknown attestation format: {name}")))
    }
}

impl TryFrom<String> for AttestationFormat {
    type Error = WebAuthnError;

    fn try_from(name: String) -> Result<Self> {
        name.parse()
    }
}

impl From<AttestationFormat> for String {
    fn from(format: AttestationFormat) -> Self {
        format.name().to_string()
    }
}

/// Format-specific attestation statement
#[derive(Debug, Clone)]
pub enum AttestationStatement {
    AndroidKey(AndroidKeyStatement),
    AndroidSafetyNet(AndroidSafetyNetStatement),
    Apple(AppleStatement),
    FidoU2f(FidoU2fStatement),
    None,
    Packed(PackedStatement),
    Tpm(TpmStatement),
}

impl AttestationStatement {
    fn parse(format: AttestationFormat, stmt: &CborMap) -> Result<Self> {
        Ok(match format {
            AttestationFormat::AndroidKey => Self::AndroidKey(AndroidKeyStatement::parse(stmt)?),
            AttestationFormat::AndroidSafetyNet => {
                Self::AndroidSafetyNet(AndroidSafetyNetStatement::parse(stmt)?)
            }
            AttestationFormat::Apple => Self::Apple(AppleStatement::parse(stmt)?),
            AttestationFormat::FidoU2f => Self::FidoU2f(FidoU2fStatement::parse(stmt)?),
            AttestationFormat::None => Self::None,
            AttestationFormat::Packed => Self::Packed(PackedStatement::parse(stmt)?),
            AttestationFormat::Tpm => Self::Tpm(TpmStatement::parse(stmt)?),
        })
    }

    fn verify(&self, auth_data: &AuthenticatorData, client_data_hash: &[u8]) -> Result<()> {
        match self {
            Self::AndroidKey(stmt) => stmt.verify(auth_data, client_data_hash),
            Self::AndroidSafetyNet(stmt) => stmt.verify(auth_data, client_data_hash),
            Self::Apple(stmt) => stmt.verify(auth_data, client_data_hash),
            Self::FidoU2f(stmt) => stmt.verify(auth_data, client_data_hash),
            Self::None => none::verify(),
            Self::Packed(stmt) => stmt.verify(auth_data, client_data_hash),
            Self::Tpm(stmt) => stmt.verify(auth_data, client_data_hash),
        }
    }

    /// Certificate chain carried in the statement, attestation certificate first
    fn certificates(&self) -> &[Certificate] {
        match self {
            Self::AndroidKey(stmt) => &stmt.x5c,
            Self::AndroidSafetyNet(stmt) => stmt.certificates(),
            Self::Apple(stmt) => &stmt.x5c,
            Self::FidoU2f(stmt) => std::slice::from_ref(&stmt.certificate),
            Self::None => &[],
            Self::Packed(stmt) => &stmt.x5c,
            Self::Tpm(stmt) => &stmt.x5c,
        }
    }
}

/// Parsed attestation object
#[derive(Debug, Clone)]
pub struct AttestationObject {
    format: AttestationFormat,
    statement: AttestationStatement,
    authenticator_data: AuthenticatorData,
}

impl AttestationObject {
    /// Parse a CBOR attestation object, accepting only `allowed_formats`
    ///
    /// # Errors
    /// Returns `InvalidData` for a missing or malformed `fmt`, `attStmt` or
    /// `authData`, a format outside `allowed_formats` or an unknown format,
    /// and any error from parsing the authenticator data
    pub fn parse(bytes: &[u8], allowed_formats: &[AttestationFormat]) -> Result<Self> {
        let value = cbor::decode(bytes)?;

        let fmt = value
            .get("fmt")
            .and_then(CborValue::as_text)
            .ok_or_else(|| WebAuthnError::invalid_data("Invalid attestation format"))?;
        let stmt = value
            .get("attStmt")
            .and_then(CborValue::as_map)
            .ok_or_else(|| WebAuthnError::invalid_data("Invalid attestation statement"))?;
        let auth_data = value
            .get("authData")
            .and_then(CborValue::as_bytes)
            .ok_or_else(|| WebAuthnError::invalid_data("Invalid authenticator data"))?;

        let authenticator_data = AuthenticatorData::parse(auth_data)?;

        let format = allowed_formats
            .iter()
            .copied()
            .find(|format| format.name() == fmt)
            .ok_or_else(|| {
                WebAuthnError::invalid_data(format!("Invalid attestation format: {fmt}"))
            })?;

        let statement = AttestationStatement::parse(format, stmt)?;
        log::trace!("Parsed {format} attestation statement");

        Ok(Self {
            format,
            statement,
            authenticator_data,
        })
    }

    #[must_use]
    pub const fn format(&self) -> AttestationFormat {
        self.format
    }

    #[must_use]
    pub const fn statement(&self) -> &AttestationStatement {
        &self.statement
    }

    #[must_use]
    pub const fn authenticator_data(&self) -> &AuthenticatorData {
        &self.authenticator_data
    }

    /// Byte-exact comparison of the RP ID hash in the authenticator data
    #[must_use]
    pub fn validate_rp_id_hash(&self, rp_id_hash: &[u8]) -> bool {
        self.authenticator_data.rp_id_hash().as_slice() == rp_id_hash
    }

    /// Whether the attestation statement verifies against `client_data_hash`
    #[must_use]
    pub fn validate_attestation(&self, client_data_hash: &[u8]) -> bool {
        match self
            .statement
            .verify(&self.authenticator_data, client_data_hash)
        {
            Ok(()) => true,
            Err(e) => {
                log::debug!("{} attestation rejected: {e}", self.format);
                false
            }
        }
    }

    /// Whether the attestation certificate chains to one of `roots`
    ///
    /// Statements without certificates never validate.
    #[must_use]
    pub fn validate_root_certificate(&self, roots: &RootCertificates) -> bool {
        roots.validate(self.statement.certificates())
    }

    /// PEM of the attestation certificate
    #[must_use]
    pub fn certificate_pem(&self) -> Option<String> {
        self.statement.certificates().first().map(Certificate::to_pem)
    }

    /// PEM bundle of intermediate certificates
    #[must_use]
    pub fn certificate_chain(&self) -> Option<String> {
        certificate::chain_pem(self.statement.certificates())
    }

    #[must_use]
    pub fn certificate_issuer(&self) -> Option<String> {
        self.statement
            .certificates()
            .first()
            .and_then(|cert| cert.issuer().ok())
    }

    #[must_use]
    pub fn certificate_subject(&self) -> Option<String> {
        self.statement
            .certificates()
            .first()
            .and_then(|cert| cert.subject().ok())
    }

    /// SafetyNet `ctsProfileMatch`; `None` for other formats
    #[must_use]
    pub fn cts_profile_match(&self) -> Option<bool> {
        match &self.statement {
            AttestationStatement::AndroidSafetyNet(stmt) => Some(stmt.cts_profile_match()),
            _ => None,
        }
    }
}

fn field<'a>(stmt: &'a CborMap, name: &str) -> Option<&'a CborValue> {
    stmt.get(&CborKey::text(name))
}

/// Required `alg` entry naming a supported algorithm
fn required_alg(stmt: &CborMap) -> Result<CoseAlgorithm> {
    let alg = field(stmt, "alg")
        .and_then(CborValue::as_integer)
        .ok_or_else(|| WebAuthnError::invalid_data("Invalid alg in attestation statement"))?;
    CoseAlgorithm::from_i64(alg).ok_or_else(|| {
        WebAuthnError::invalid_data(format!("Unsupported alg {alg} in attestation statement"))
    })
}

/// Required byte string entry
fn required_bytes(stmt: &CborMap, name: &str) -> Result<Vec<u8>> {
    field(stmt, name)
        .and_then(CborValue::as_bytes)
        .map(<[u8]>::to_vec)
        .ok_or_else(|| WebAuthnError::invalid_data(format!("Invalid {name} in attestation statement")))
}

/// `x5c` entry, `None` when absent
fn optional_x5c(stmt: &CborMap) -> Result<Option<Vec<Certificate>>> {
    let Some(value) = field(stmt, "x5c") else {
        return Ok(None);
    };

    let entries = value
        .as_array()
        .filter(|items| !items.is_empty())
        .ok_or_else(|| WebAuthnError::invalid_data("Invalid x5c certificate"))?;

    let ders = entries
        .iter()
        .map(|item| {
            item.as_bytes()
                .map(<[u8]>::to_vec)
                .ok_or_else(|| WebAuthnError::invalid_data("Invalid x5c certificate"))
        })
        .collect::<Result<Vec<_>>>()?;

    certificate::parse_chain(ders).map(Some)
}

/// Required non-empty `x5c` entry
fn required_x5c(stmt: &CborMap) -> Result<Vec<Certificate>> {
    optional_x5c(stmt)?.ok_or_else(|| WebAuthnError::invalid_data("Missing x5c certificate"))
}

/// Message signed by packed, android-key and similar statements
fn signed_data(auth_data: &AuthenticatorData, client_data_hash: &[u8]) -> Vec<u8> {
    [auth_data.raw(), client_data_hash].concat()
}
