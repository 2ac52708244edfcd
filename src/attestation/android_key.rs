//! `android-key` attestation from the Android hardware keystore

use x509_parser::der_parser::parse_der;

use crate::authenticator_data::AuthenticatorData;
use crate::cbor::CborMap;
use crate::certificate::Certificate;
use crate::cose::CoseAlgorithm;
use crate::error::{Result, WebAuthnError};

/// Android key attestation extension (`KeyDescription`)
const OID_KEY_DESCRIPTION: &str = "1.3.6.1.4.1.11129.2.1.17";

/// Position of `attestationChallenge` inside `KeyDescription`
const ATTESTATION_CHALLENGE_INDEX: usize = 4;

#[derive(Debug, Clone)]
pub struct AndroidKeyStatement {
    pub alg: CoseAlgorithm,
    pub sig: Vec<u8>,
    pub x5c: Vec<Certificate>,
}

impl AndroidKeyStatement {
    pub(super) fn parse(stmt: &CborMap) -> Result<Self> {
        Ok(Self {
            alg: super::required_alg(stmt)?,
            sig: super::required_bytes(stmt, "sig")?,
            x5c: super::required_x5c(stmt)?,
        })
    }

    fn certificate(&self) -> Result<&Certificate> {
        self.x5c
            .first()
            .ok_or_else(|| WebAuthnError::invalid_data("Missing x5c certificate"))
    }

    pub(super) fn verify(&self, auth_data: &AuthenticatorData, client_data_hash: &[u8]) -> Result<()> {
        let cert = self.certificate()?;

        if cert.public_key_der()? != auth_data.public_key_der()? {
            return Err(WebAuthnError::InvalidSignature(
                "Certificate key does not match credential key".to_string(),
            ));
        }

        let description = cert.extension(OID_KEY_DESCRIPTION).ok_or_else(|| {
            WebAuthnError::invalid_data("Missing Android key description extension")
        })?;
        if attestation_challenge(&description)? != client_data_hash {
            return Err(WebAuthnError::InvalidSignature(
                "Attestation challenge does not match client data hash".to_string(),
            ));
        }

        let key = cert.public_key()?;
        if key.algorithm() != self.alg {
            return Err(WebAuthnError::InvalidSignature(format!(
                "Statement alg {} does not match certificate key",
                self.alg.name()
            )));
        }

        key.verify(&super::signed_data(auth_data, client_data_hash), &self.sig)
    }
}

fn attestation_challenge(description: &[u8]) -> Result<Vec<u8>> {
    let invalid = || WebAuthnError::invalid_data("Invalid Android key description");

    let (_, object) = parse_der(description).map_err(|_| invalid())?;
    let fields = object.as_sequence().map_err(|_| invalid())?;
    let challenge = fields
        .get(ATTESTATION_CHALLENGE_INDEX)
        .and_then(|field| field.as_slice().ok())
        .ok_or_else(invalid)?;

    Ok(challenge.to_vec())
}
