//! `fido-u2f` attestation for CTAP1 authenticators

use crate::authenticator_data::AuthenticatorData;
use crate::cbor::{CborMap, CborValue};
use crate::certificate::Certificate;
use crate::cose::CoseAlgorithm;
use crate::crypto::PublicKey;
use crate::error::{Result, WebAuthnError};

#[derive(Debug, Clone)]
pub struct FidoU2fStatement {
    pub sig: Vec<u8>,
    pub certificate: Certificate,
}

impl FidoU2fStatement {
    pub(super) fn parse(stmt: &CborMap) -> Result<Self> {
        if let Some(alg) = super::field(stmt, "alg") {
            if alg.as_integer() != Some(CoseAlgorithm::Es256.value()) {
                return Err(WebAuthnError::invalid_data("U2F attestation requires ES256"));
            }
        }

        let sig = super::required_bytes(stmt, "sig")?;

        let cert_count = super::field(stmt, "x5c")
            .and_then(CborValue::as_array)
            .map(<[CborValue]>::len);
        if cert_count != Some(1) {
            return Err(WebAuthnError::invalid_data(
                "U2F attestation requires exactly one certificate",
            ));
        }
        let mut x5c = super::required_x5c(stmt)?;
        let certificate = x5c.remove(0);

        Ok(Self { sig, certificate })
    }

    pub(super) fn verify(&self, auth_data: &AuthenticatorData, client_data_hash: &[u8]) -> Result<()> {
        let key = self.certificate.public_key()?;
        if !matches!(key, PublicKey::P256(_)) {
            return Err(WebAuthnError::invalid_public_key(
                "U2F attestation certificate must hold a P-256 key",
            ));
        }

        let mut data = Vec::with_capacity(1 + 32 + 32 + 128 + 65);
        data.push(0x00);
        data.extend_from_slice(auth_data.rp_id_hash());
        data.extend_from_slice(client_data_hash);
        data.extend_from_slice(auth_data.credential_id()?);
        data.extend_from_slice(&auth_data.public_key_u2f()?);

        key.verify(&data, &self.sig)
    }
}
