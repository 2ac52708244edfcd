//! `apple` anonymous attestation

use crate::authenticator_data::AuthenticatorData;
use crate::cbor::CborMap;
use crate::certificate::Certificate;
use crate::crypto;
use crate::error::{Result, WebAuthnError};

/// Apple anonymous attestation nonce extension
const OID_APPLE_NONCE: &str = "1.2.840.113635.100.8.2";

/// `SEQUENCE { [1] { OCTET STRING (32) } }` header in front of the nonce
const NONCE_PREFIX: [u8; 6] = [0x30, 0x24, 0xa1, 0x22, 0x04, 0x20];

#[derive(Debug, Clone)]
pub struct AppleStatement {
    pub x5c: Vec<Certificate>,
}

impl AppleStatement {
    pub(super) fn parse(stmt: &CborMap) -> Result<Self> {
        Ok(Self {
            x5c: super::required_x5c(stmt)?,
        })
    }

    pub(super) fn verify(&self, auth_data: &AuthenticatorData, client_data_hash: &[u8]) -> Result<()> {
        let cert = self
            .x5c
            .first()
            .ok_or_else(|| WebAuthnError::invalid_data("Missing x5c certificate"))?;

        let nonce = crypto::sha256(&super::signed_data(auth_data, client_data_hash));
        let extension = cert
            .extension(OID_APPLE_NONCE)
            .ok_or_else(|| WebAuthnError::invalid_data("Missing Apple nonce extension"))?;

        if extension.strip_prefix(NONCE_PREFIX.as_slice()) != Some(nonce.as_slice()) {
            return Err(WebAuthnError::InvalidSignature(
                "Apple nonce does not match".to_string(),
            ));
        }

        if cert.public_key_der()? != auth_data.public_key_der()? {
            return Err(WebAuthnError::InvalidSignature(
                "Certificate key does not match credential key".to_string(),
            ));
        }

        Ok(())
    }
}
