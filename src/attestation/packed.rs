//! `packed` attestation
//!
//! Either full attestation, signed by the key in the `x5c` certificate, or
//! self attestation, signed by the credential key itself.

use crate::authenticator_data::AuthenticatorData;
use crate::cbor::CborMap;
use crate::certificate::Certificate;
use crate::cose::CoseAlgorithm;
use crate::crypto::PublicKey;
use crate::error::{Result, WebAuthnError};

#[derive(Debug, Clone)]
pub struct PackedStatement {
    pub alg: CoseAlgorithm,
    pub sig: Vec<u8>,
    /// Empty for self attestation
    pub x5c: Vec<Certificate>,
}

impl PackedStatement {
    pub(super) fn parse(stmt: &CborMap) -> Result<Self> {
        let alg = super::required_alg(stmt)?;
        let sig = super::required_bytes(stmt, "sig")?;

        if super::field(stmt, "ecdaaKeyId").is_some() {
            return Err(WebAuthnError::invalid_data("ECDAA attestation is not supported"));
        }

        let x5c = super::optional_x5c(stmt)?.unwrap_or_default();
        Ok(Self { alg, sig, x5c })
    }

    #[must_use]
    pub fn is_self_attestation(&self) -> bool {
        self.x5c.is_empty()
    }

    pub(super) fn verify(&self, auth_data: &AuthenticatorData, client_data_hash: &[u8]) -> Result<()> {
        let key = match self.x5c.first() {
            Some(cert) => cert.public_key()?,
            None => PublicKey::from_cose(auth_data.public_key()?)?,
        };

        if key.algorithm() != self.alg {
            return Err(WebAuthnError::InvalidSignature(format!(
                "Statement alg {} does not match {} key",
                self.alg.name(),
                key.algorithm().name()
            )));
        }

        key.verify(&super::signed_data(auth_data, client_data_hash), &self.sig)
    }
}
