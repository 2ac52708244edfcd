//! `android-safetynet` attestation
//!
//! The statement carries a SafetyNet JWS whose nonce binds it to the
//! authenticator data and client data.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;

use crate::authenticator_data::AuthenticatorData;
use crate::buffer::ByteBuffer;
use crate::cbor::{CborMap, CborValue};
use crate::certificate::{self, Certificate};
use crate::crypto;
use crate::error::{Result, WebAuthnError};

const ATTESTATION_HOSTNAME: &str = "attest.android.com";

#[derive(Debug, Clone, Deserialize)]
struct JwsHeader {
    alg: String,
    #[serde(default)]
    x5c: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SafetyNetPayload {
    nonce: Option<String>,
    #[serde(default)]
    cts_profile_match: bool,
    #[serde(default)]
    basic_integrity: bool,
    timestamp_ms: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JwsAlgorithm {
    Rs256,
    Es256,
}

#[derive(Debug, Clone)]
pub struct AndroidSafetyNetStatement {
    pub ver: String,
    alg: JwsAlgorithm,
    x5c: Vec<Certificate>,
    payload: SafetyNetPayload,
    signed_input: String,
    signature: Vec<u8>,
}

impl AndroidSafetyNetStatement {
    pub(super) fn parse(stmt: &CborMap) -> Result<Self> {
        let ver = super::field(stmt, "ver")
            .and_then(CborValue::as_text)
            .filter(|ver| !ver.is_empty())
            .ok_or_else(|| WebAuthnError::invalid_data("Invalid Android SafetyNet version"))?
            .to_string();

        let response = super::required_bytes(stmt, "response")?;
        let response = String::from_utf8(response)
            .map_err(|_| WebAuthnError::invalid_data("Invalid Android SafetyNet response"))?;

        let parts: Vec<&str> = response.split('.').collect();
        let [header_b64, payload_b64, signature_b64] = parts.as_slice() else {
            return Err(WebAuthnError::invalid_data("Invalid JWS data"));
        };

        let header: JwsHeader = decode_json(header_b64)?;
        let alg = match header.alg.as_str() {
            "RS256" => JwsAlgorithm::Rs256,
            "ES256" => JwsAlgorithm::Es256,
            other => {
                return Err(WebAuthnError::invalid_data(format!(
                    "Invalid JWS algorithm {other}"
                )))
            }
        };

        if header.x5c.is_empty() {
            return Err(WebAuthnError::invalid_data("No X.509 signature in JWS header"));
        }
        let ders = header
            .x5c
            .iter()
            .map(|cert| {
                STANDARD
                    .decode(cert)
                    .map_err(|_| WebAuthnError::invalid_data("Invalid x5c certificate in JWS header"))
            })
            .collect::<Result<Vec<_>>>()?;
        let x5c = certificate::parse_chain(ders)?;

        let payload: SafetyNetPayload = decode_json(payload_b64)?;
        let signature = ByteBuffer::from_base64url(signature_b64)?;

        Ok(Self {
            ver,
            alg,
            x5c,
            payload,
            signed_input: format!("{header_b64}.{payload_b64}"),
            signature,
        })
    }

    pub(super) fn certificates(&self) -> &[Certificate] {
        &self.x5c
    }

    #[must_use]
    pub const fn cts_profile_match(&self) -> bool {
        self.payload.cts_profile_match
    }

    #[must_use]
    pub const fn timestamp_ms(&self) -> Option<i64> {
        self.payload.timestamp_ms
    }

    pub(super) fn verify(&self, auth_data: &AuthenticatorData, client_data_hash: &[u8]) -> Result<()> {
        let expected_nonce =
            STANDARD.encode(crypto::sha256(&super::signed_data(auth_data, client_data_hash)));
        if self.payload.nonce.as_deref() != Some(expected_nonce.as_str()) {
            return Err(WebAuthnError::InvalidSignature(
                "SafetyNet nonce does not match".to_string(),
            ));
        }

        let cert = self
            .x5c
            .first()
            .ok_or_else(|| WebAuthnError::invalid_data("Missing x5c certificate"))?;
        if cert.common_name().as_deref() != Some(ATTESTATION_HOSTNAME) {
            return Err(WebAuthnError::InvalidSignature(format!(
                "SafetyNet certificate is not issued to {ATTESTATION_HOSTNAME}"
            )));
        }

        if !self.payload.basic_integrity {
            return Err(WebAuthnError::InvalidSignature(
                "SafetyNet basic integrity check failed".to_string(),
            ));
        }

        let signature = match self.alg {
            JwsAlgorithm::Es256 if self.signature.len() == 64 => {
                // JWS carries ECDSA signatures as raw r || s
                p256::ecdsa::Signature::from_slice(&self.signature)
                    .map(|sig| sig.to_der().as_bytes().to_vec())
                    .map_err(|_| {
                        WebAuthnError::InvalidSignature("Malformed JWS signature".to_string())
                    })?
            }
            JwsAlgorithm::Es256 | JwsAlgorithm::Rs256 => self.signature.clone(),
        };

        cert.public_key()?
            .verify(self.signed_input.as_bytes(), &signature)
    }
}

fn decode_json<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T> {
    let bytes = ByteBuffer::from_base64url(segment)?;
    serde_json::from_slice(&bytes)
        .map_err(|e| WebAuthnError::invalid_data(format!("Invalid JWS segment: {e}")))
}
