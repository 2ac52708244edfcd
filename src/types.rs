//! `WebAuthn` ceremony types
//!
//! Options sent to the browser and results returned from the ceremonies.
//! Field names follow the `WebAuthn` JSON conventions; binary values are
//! base64url without padding.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::attestation::AttestationFormat;
use crate::buffer::ByteBuffer;
use crate::cose::CoseAlgorithm;
use crate::error::Result;

const PUBLIC_KEY_TYPE: &str = "public-key";

/// `WebAuthn` relying party information
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RelyingParty {
    pub id: String,
    pub name: String,
}

/// `WebAuthn` user entity
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserEntity {
    /// Base64url user handle
    pub id: String,
    pub name: String,
    pub display_name: String,
}

impl UserEntity {
    #[must_use]
    pub fn new(user_handle: &[u8], name: &str, display_name: &str) -> Self {
        Self {
            id: ByteBuffer::to_base64url(user_handle),
            name: name.to_string(),
            display_name: display_name.to_string(),
        }
    }
}

/// Public key credential parameters
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PublicKeyCredentialParameters {
    #[serde(rename = "type")]
    pub r#type: String,
    pub alg: i64,
}

impl From<CoseAlgorithm> for PublicKeyCredentialParameters {
    fn from(alg: CoseAlgorithm) -> Self {
        Self {
            r#type: PUBLIC_KEY_TYPE.to_string(),
            alg: alg.value(),
        }
    }
}

/// Authenticator transport hints
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Usb,
    Nfc,
    Ble,
    Hybrid,
    Internal,
}

impl Transport {
    pub const ALL: [Self; 5] = [
        Self::Usb,
        Self::Nfc,
        Self::Ble,
        Self::Hybrid,
        Self::Internal,
    ];
}

/// Public key credential descriptor
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PublicKeyCredentialDescriptor {
    #[serde(rename = "type")]
    pub r#type: String,
    /// Base64url credential ID
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transports: Vec<Transport>,
}

impl PublicKeyCredentialDescriptor {
    #[must_use]
    pub fn new(credential_id: &[u8], transports: &[Transport]) -> Self {
        Self {
            r#type: PUBLIC_KEY_TYPE.to_string(),
            id: ByteBuffer::to_base64url(credential_id),
            transports: transports.to_vec(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserVerification {
    Required,
    #[default]
    Preferred,
    Discouraged,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResidentKey {
    Required,
    Preferred,
    #[default]
    Discouraged,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthenticatorAttachment {
    #[serde(rename = "platform")]
    Platform,
    #[serde(rename = "cross-platform")]
    CrossPlatform,
}

/// Attestation conveyance preference
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttestationConveyance {
    None,
    Indirect,
    Direct,
}

/// Authenticator selection criteria
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorSelectionCriteria {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authenticator_attachment: Option<AuthenticatorAttachment>,
    pub resident_key: ResidentKey,
    pub require_resident_key: bool,
    pub user_verification: UserVerification,
}

impl AuthenticatorSelectionCriteria {
    #[must_use]
    pub fn new(
        user_verification: UserVerification,
        resident_key: ResidentKey,
        authenticator_attachment: Option<AuthenticatorAttachment>,
    ) -> Self {
        Self {
            authenticator_attachment,
            resident_key,
            require_resident_key: resident_key == ResidentKey::Required,
            user_verification,
        }
    }
}

/// `PublicKeyCredentialCreationOptions` for `navigator.credentials.create()`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationOptions {
    pub challenge: String,
    pub rp: RelyingParty,
    pub user: UserEntity,
    pub pub_key_cred_params: Vec<PublicKeyCredentialParameters>,
    /// Milliseconds
    pub timeout: u64,
    pub attestation: AttestationConveyance,
    pub authenticator_selection: AuthenticatorSelectionCriteria,
    #[serde(default)]
    pub exclude_credentials: Vec<PublicKeyCredentialDescriptor>,
}

/// `PublicKeyCredentialRequestOptions` for `navigator.credentials.get()`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationOptions {
    pub challenge: String,
    pub timeout: u64,
    pub rp_id: String,
    #[serde(default)]
    pub allow_credentials: Vec<PublicKeyCredentialDescriptor>,
    pub user_verification: UserVerification,
}

/// Challenge issued with a set of options, kept by the caller until the
/// ceremony completes
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChallengeState {
    /// Base64url challenge
    pub challenge: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ChallengeState {
    pub(crate) fn new(challenge: &[u8], timeout_seconds: u64) -> Self {
        let created_at = Utc::now();
        let expires_at = i64::try_from(timeout_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|ttl| created_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            challenge: ByteBuffer::to_base64url(challenge),
            created_at,
            expires_at,
        }
    }

    /// Raw challenge bytes to pass to the ceremony
    ///
    /// # Errors
    /// Returns `InvalidData` if the stored challenge is not base64url
    pub fn challenge_bytes(&self) -> Result<Vec<u8>> {
        ByteBuffer::from_base64url(&self.challenge)
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// Outcome of a successful registration, ready to be stored
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RegistrationResult {
    pub rp_id: String,
    pub attestation_format: AttestationFormat,
    /// Base64url credential ID
    pub credential_id: String,
    /// `-----BEGIN PUBLIC KEY-----` PEM
    pub credential_public_key: String,
    pub certificate_chain: Option<String>,
    pub certificate: Option<String>,
    pub certificate_issuer: Option<String>,
    pub certificate_subject: Option<String>,
    pub signature_counter: u32,
    /// Hyphenated AAGUID
    pub aaguid: String,
    /// `None` when no root certificates are configured
    pub root_valid: Option<bool>,
    pub user_present: bool,
    pub user_verified: bool,
    pub is_backup_eligible: bool,
    pub is_backup: bool,
}

impl RegistrationResult {
    /// Raw credential ID
    ///
    /// # Errors
    /// Returns `InvalidData` if the stored ID is not base64url
    pub fn credential_id_bytes(&self) -> Result<Vec<u8>> {
        ByteBuffer::from_base64url(&self.credential_id)
    }
}

/// Outcome of a successful authentication
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct AssertionResult {
    /// New signature counter, to be persisted by the caller
    pub signature_counter: u32,
    pub user_present: bool,
    pub user_verified: bool,
    pub is_backup_eligible: bool,
    pub is_backup: bool,
}
