//! Credential storage
//!
//! The ceremonies only need to look a credential up by ID and write it back
//! after use. [`CredentialStore`] is that contract; persistence backends
//! implement it. [`InMemoryCredentialStore`] is the reference backend used
//! by the CLI and tests.

use std::collections::HashMap;
use std::sync::RwLock;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attestation::AttestationFormat;
use crate::types::{AssertionResult, PublicKeyCredentialDescriptor, RegistrationResult, Transport};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Serialize: {0}")]
    Serialization(String),
    #[error("Corrupt: {0}")]
    Corrupt(String),
    #[error("Store lock poisoned")]
    Poisoned,
}

/// Credential registered for a user
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct StoredCredential {
    /// Base64url credential ID
    pub credential_id: String,
    /// Base64url user handle
    pub user_id: String,
    pub rp_id: String,
    /// PEM public key
    pub public_key: String,
    pub aaguid: String,
    pub attestation_format: AttestationFormat,
    pub signature_counter: u32,
    pub enabled: bool,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
    #[serde(default)]
    pub transports: Vec<Transport>,
}

impl StoredCredential {
    /// Create a credential from a successful registration
    #[must_use]
    pub fn from_registration(
        result: &RegistrationResult,
        user_id: &str,
        transports: &[Transport],
    ) -> Self {
        Self {
            credential_id: result.credential_id.clone(),
            user_id: user_id.to_string(),
            rp_id: result.rp_id.clone(),
            public_key: result.credential_public_key.clone(),
            aaguid: result.aaguid.clone(),
            attestation_format: result.attestation_format,
            signature_counter: result.signature_counter,
            enabled: true,
            name: None,
            created_at: Utc::now(),
            last_used: None,
            transports: transports.to_vec(),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Record a successful authentication
    pub fn record_use(&mut self, assertion: &AssertionResult) {
        self.signature_counter = assertion.signature_counter;
        self.last_used = Some(Utc::now());
    }

    /// Descriptor for `allowCredentials` / `excludeCredentials`
    #[must_use]
    pub fn descriptor(&self) -> PublicKeyCredentialDescriptor {
        PublicKeyCredentialDescriptor {
            r#type: "public-key".to_string(),
            id: self.credential_id.clone(),
            transports: self.transports.clone(),
        }
    }

    /// Encode as an opaque blob for key-value backends
    ///
    /// # Errors
    /// Returns an error if JSON serialization fails
    pub fn encode(&self) -> Result<String, StoreError> {
        let serialized =
            serde_json::to_string(self).map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(URL_SAFE_NO_PAD.encode(serialized))
    }

    /// Decode a blob produced by [`encode`](Self::encode)
    ///
    /// # Errors
    /// Returns `Corrupt` if the blob is not base64url JSON of a credential
    pub fn decode(encoded: &str) -> Result<Self, StoreError> {
        let decoded = URL_SAFE_NO_PAD
            .decode(encoded.as_bytes())
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        serde_json::from_slice(&decoded).map_err(|e| StoreError::Corrupt(e.to_string()))
    }
}

/// Credential persistence keyed by base64url credential ID
pub trait CredentialStore: Send + Sync {
    /// # Errors
    /// Returns an error if the backend fails
    fn get(&self, credential_id: &str) -> Result<Option<StoredCredential>, StoreError>;

    /// Insert or replace a credential
    ///
    /// # Errors
    /// Returns an error if the backend fails
    fn put(&self, credential: StoredCredential) -> Result<(), StoreError>;

    /// Remove a credential, returning whether it existed
    ///
    /// # Errors
    /// Returns an error if the backend fails
    fn remove(&self, credential_id: &str) -> Result<bool, StoreError>;

    /// Credentials of a user, most recently created first
    ///
    /// # Errors
    /// Returns an error if the backend fails
    fn list_for_user(&self, user_id: &str) -> Result<Vec<StoredCredential>, StoreError>;
}

#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    credentials: RwLock<HashMap<String, StoredCredential>>,
}

impl InMemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// Returns `Poisoned` if a writer panicked
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.credentials.read().map_err(|_| StoreError::Poisoned)?.len())
    }

    /// # Errors
    /// Returns `Poisoned` if a writer panicked
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn get(&self, credential_id: &str) -> Result<Option<StoredCredential>, StoreError> {
        let credentials = self.credentials.read().map_err(|_| StoreError::Poisoned)?;
        Ok(credentials.get(credential_id).cloned())
    }

    fn put(&self, credential: StoredCredential) -> Result<(), StoreError> {
        let mut credentials = self.credentials.write().map_err(|_| StoreError::Poisoned)?;
        credentials.insert(credential.credential_id.clone(), credential);
        Ok(())
    }

    fn remove(&self, credential_id: &str) -> Result<bool, StoreError> {
        let mut credentials = self.credentials.write().map_err(|_| StoreError::Poisoned)?;
        Ok(credentials.remove(credential_id).is_some())
    }

    fn list_for_user(&self, user_id: &str) -> Result<Vec<StoredCredential>, StoreError> {
        let credentials = self.credentials.read().map_err(|_| StoreError::Poisoned)?;
        let mut records: Vec<StoredCredential> = credentials
            .values()
            .filter(|credential| credential.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn registration(credential_id: &str) -> RegistrationResult {
        RegistrationResult {
            rp_id: "example.com".to_string(),
            attestation_format: AttestationFormat::None,
            credential_id: credential_id.to_string(),
            credential_public_key: "-----BEGIN PUBLIC KEY-----\n-----END PUBLIC KEY-----\n"
                .to_string(),
            certificate_chain: None,
            certificate: None,
            certificate_issuer: None,
            certificate_subject: None,
            signature_counter: 5,
            aaguid: "00000000-0000-0000-0000-000000000000".to_string(),
            root_valid: None,
            user_present: true,
            user_verified: false,
            is_backup_eligible: false,
            is_backup: false,
        }
    }

    #[test]
    fn test_from_registration_and_record_use() {
        let mut credential =
            StoredCredential::from_registration(&registration("Y3JlZA"), "dXNlcg", &[Transport::Usb])
                .with_name("YubiKey");
        assert!(credential.enabled);
        assert_eq!(credential.signature_counter, 5);
        assert!(credential.last_used.is_none());
        assert_eq!(credential.name.as_deref(), Some("YubiKey"));

        credential.record_use(&AssertionResult {
            signature_counter: 6,
            user_present: true,
            user_verified: true,
            is_backup_eligible: false,
            is_backup: false,
        });
        assert_eq!(credential.signature_counter, 6);
        assert!(credential.last_used.is_some());

        let descriptor = credential.descriptor();
        assert_eq!(descriptor.id, "Y3JlZA");
        assert_eq!(descriptor.transports, vec![Transport::Usb]);
    }

    #[test]
    fn test_encode_decode_blob() {
        let credential = StoredCredential::from_registration(&registration("Y3JlZA"), "dXNlcg", &[]);
        let blob = credential.encode().unwrap();
        assert!(!blob.contains('='));
        assert_eq!(StoredCredential::decode(&blob).unwrap(), credential);

        assert!(matches!(
            StoredCredential::decode("!!not base64!!"),
            Err(StoreError::Corrupt(_))
        ));
        assert!(matches!(
            StoredCredential::decode(&URL_SAFE_NO_PAD.encode("{}")),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn test_in_memory_store() {
        let store = InMemoryCredentialStore::new();
        assert!(store.is_empty().unwrap());

        let mut older = StoredCredential::from_registration(&registration("YQ"), "alice", &[]);
        older.created_at -= Duration::hours(1);
        let newer = StoredCredential::from_registration(&registration("Yg"), "alice", &[]);
        let other = StoredCredential::from_registration(&registration("Yw"), "bob", &[]);

        store.put(older).unwrap();
        store.put(newer).unwrap();
        store.put(other).unwrap();
        assert_eq!(store.len().unwrap(), 3);

        let alice: Vec<String> = store
            .list_for_user("alice")
            .unwrap()
            .into_iter()
            .map(|credential| credential.credential_id)
            .collect();
        assert_eq!(alice, vec!["Yg", "YQ"]);

        let mut fetched = store.get("YQ").unwrap().unwrap();
        fetched.enabled = false;
        store.put(fetched).unwrap();
        assert!(!store.get("YQ").unwrap().unwrap().enabled);

        assert!(store.remove("Yw").unwrap());
        assert!(!store.remove("Yw").unwrap());
        assert!(store.get("Yw").unwrap().is_none());
        assert!(store.list_for_user("bob").unwrap().is_empty());
    }
}
