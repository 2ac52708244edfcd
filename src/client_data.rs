//! clientDataJSON parsing and origin policy

use regex::Regex;
use serde_json::Value;
use url::Url;

use crate::buffer::ByteBuffer;
use crate::error::{Result, WebAuthnError};

const ANDROID_ORIGIN_PREFIX: &str = "android:apk-key-hash:";

/// Ceremony type recorded in clientDataJSON
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CeremonyType {
    Create,
    Get,
}

impl CeremonyType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "webauthn.create",
            Self::Get => "webauthn.get",
        }
    }
}

/// Parsed clientDataJSON
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientData {
    json: serde_json::Map<String, Value>,
}

impl ClientData {
    /// # Errors
    /// Returns `InvalidData` unless `raw` is a JSON object
    pub fn parse(raw: &[u8]) -> Result<Self> {
        match serde_json::from_slice(raw) {
            Ok(Value::Object(json)) => Ok(Self { json }),
            _ => Err(WebAuthnError::invalid_data("Invalid client data")),
        }
    }

    fn text(&self, key: &str) -> Option<&str> {
        self.json.get(key).and_then(Value::as_str)
    }

    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        self.text("type")
    }

    #[must_use]
    pub fn challenge(&self) -> Option<&str> {
        self.text("challenge")
    }

    #[must_use]
    pub fn origin(&self) -> Option<&str> {
        self.text("origin")
    }

    #[must_use]
    pub fn cross_origin(&self) -> Option<bool> {
        self.json.get("crossOrigin").and_then(Value::as_bool)
    }

    /// # Errors
    /// Returns `InvalidType` unless `type` equals the ceremony's type
    pub fn check_type(&self, expected: CeremonyType) -> Result<()> {
        if self.kind() == Some(expected.as_str()) {
            Ok(())
        } else {
            Err(WebAuthnError::InvalidType(format!(
                "Expected {}, got {}",
                expected.as_str(),
                self.kind().unwrap_or("nothing")
            )))
        }
    }

    /// # Errors
    /// Returns `InvalidChallenge` if the challenge is missing, not base64url
    /// or different from `expected`
    pub fn check_challenge(&self, expected: &[u8]) -> Result<()> {
        let challenge = self
            .challenge()
            .ok_or_else(|| WebAuthnError::InvalidChallenge("Missing challenge".to_string()))?;
        let decoded = ByteBuffer::from_base64url(challenge)
            .map_err(|_| WebAuthnError::InvalidChallenge("Undecodable challenge".to_string()))?;

        if decoded == expected {
            Ok(())
        } else {
            Err(WebAuthnError::InvalidChallenge(
                "Challenge does not match".to_string(),
            ))
        }
    }
}

/// Rules deciding which origins may act for a relying party
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    rp_id: String,
    host_pattern: Regex,
    android_key_hashes: Vec<String>,
}

impl OriginPolicy {
    /// Policy for `rp_id`
    ///
    /// By default any host ending in `rp_id` is accepted, so `evilexample.com`
    /// passes for `example.com`. With `require_label_boundary` the host must
    /// equal `rp_id` or be a subdomain of it.
    ///
    /// # Errors
    /// Returns `InvalidData` if the host pattern cannot be compiled
    pub fn new(
        rp_id: &str,
        android_key_hashes: Vec<String>,
        require_label_boundary: bool,
    ) -> Result<Self> {
        let boundary = if require_label_boundary { r"(^|\.)" } else { "" };
        let pattern = format!("(?i){boundary}{}$", regex::escape(rp_id));
        let host_pattern = Regex::new(&pattern)
            .map_err(|e| WebAuthnError::invalid_data(format!("Invalid RP ID pattern: {e}")))?;

        Ok(Self {
            rp_id: rp_id.to_string(),
            host_pattern,
            android_key_hashes,
        })
    }

    #[must_use]
    pub fn is_allowed(&self, origin: &str) -> bool {
        if let Some(hash) = origin.strip_prefix(ANDROID_ORIGIN_PREFIX) {
            return self.android_key_hashes.iter().any(|known| known == hash);
        }

        let Ok(url) = Url::parse(origin) else {
            return false;
        };

        if self.rp_id != "localhost" && url.scheme() != "https" {
            return false;
        }

        url.host_str()
            .map(|host| host.trim_matches('.'))
            .is_some_and(|host| self.host_pattern.is_match(host))
    }

    /// # Errors
    /// Returns `InvalidOrigin` if `origin` is missing or not allowed
    pub fn check(&self, origin: Option<&str>) -> Result<()> {
        match origin {
            Some(origin) if self.is_allowed(origin) => Ok(()),
            Some(origin) => Err(WebAuthnError::InvalidOrigin(format!(
                "Origin {origin} not allowed for {}",
                self.rp_id
            ))),
            None => Err(WebAuthnError::InvalidOrigin("Missing origin".to_string())),
        }
    }
}
