//! `tpm` attestation
//!
//! The AIK certificate signs a `TPMS_ATTEST` structure (`certInfo`) whose
//! `extraData` is the hash of the attested data.

use crate::authenticator_data::AuthenticatorData;
use crate::buffer::ByteBuffer;
use crate::cbor::{CborMap, CborValue};
use crate::certificate::Certificate;
use crate::cose::CoseAlgorithm;
use crate::crypto;
use crate::error::{Result, WebAuthnError};

const TPM_GENERATED_VALUE: [u8; 4] = [0xff, 0x54, 0x43, 0x47];
const TPM_ST_ATTEST_CERTIFY: u16 = 0x8017;

/// Fields of `TPMS_ATTEST` up to `extraData`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertInfo {
    pub qualified_signer: Vec<u8>,
    pub extra_data: Vec<u8>,
}

impl CertInfo {
    /// # Errors
    /// Returns `InvalidData` for a wrong magic or type and `BufferError` if truncated
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let buf = ByteBuffer::new(bytes);

        if buf.bytes(0, 4)? != TPM_GENERATED_VALUE {
            return Err(WebAuthnError::invalid_data("Invalid TPM certInfo magic"));
        }
        if buf.u16_be(4)? != TPM_ST_ATTEST_CERTIFY {
            return Err(WebAuthnError::invalid_data("Invalid TPM certInfo type"));
        }

        let mut offset = 6;
        let qualified_signer = sized(&buf, &mut offset)?;
        let extra_data = sized(&buf, &mut offset)?;

        Ok(Self {
            qualified_signer,
            extra_data,
        })
    }
}

/// `TPM2B`: 16-bit big-endian size followed by that many bytes
fn sized(buf: &ByteBuffer<'_>, offset: &mut usize) -> Result<Vec<u8>> {
    let len = usize::from(buf.u16_be(*offset)?);
    let data = buf.bytes(*offset + 2, len)?.to_vec();
    *offset += 2 + len;
    Ok(data)
}

#[derive(Debug, Clone)]
pub struct TpmStatement {
    pub alg: CoseAlgorithm,
    pub sig: Vec<u8>,
    pub cert_info_raw: Vec<u8>,
    pub cert_info: CertInfo,
    pub pub_area: Vec<u8>,
    pub x5c: Vec<Certificate>,
}

impl TpmStatement {
    pub(super) fn parse(stmt: &CborMap) -> Result<Self> {
        if super::field(stmt, "ver").and_then(CborValue::as_text) != Some("2.0") {
            return Err(WebAuthnError::invalid_data("Invalid TPM version"));
        }

        let alg = super::required_alg(stmt)?;
        let sig = super::required_bytes(stmt, "sig")?;
        let cert_info_raw = super::required_bytes(stmt, "certInfo")?;
        let pub_area = super::required_bytes(stmt, "pubArea")?;
        let x5c = super::required_x5c(stmt)?;
        let cert_info = CertInfo::parse(&cert_info_raw)?;

        Ok(Self {
            alg,
            sig,
            cert_info_raw,
            cert_info,
            pub_area,
            x5c,
        })
    }

    pub(super) fn verify(&self, auth_data: &AuthenticatorData, client_data_hash: &[u8]) -> Result<()> {
        let expected = crypto::sha256(&super::signed_data(auth_data, client_data_hash));
        if self.cert_info.extra_data != expected {
            return Err(WebAuthnError::InvalidSignature(
                "TPM extraData does not match".to_string(),
            ));
        }

        let cert = self
            .x5c
            .first()
            .ok_or_else(|| WebAuthnError::invalid_data("Missing x5c certificate"))?;
        let key = cert.public_key()?;
        if key.algorithm() != self.alg {
            return Err(WebAuthnError::InvalidSignature(format!(
                "Statement alg {} does not match AIK certificate key",
                self.alg.name()
            )));
        }

        key.verify(&self.cert_info_raw, &self.sig)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cert_info(magic: [u8; 4], kind: u16, extra: &[u8]) -> Vec<u8> {
        let mut out = magic.to_vec();
        out.extend_from_slice(&kind.to_be_bytes());
        out.extend_from_slice(&[0x00, 0x02, 0xaa, 0xbb]);
        out.extend_from_slice(&u16::try_from(extra.len()).unwrap().to_be_bytes());
        out.extend_from_slice(extra);
        out.extend_from_slice(&[0u8; 17]);
        out
    }

    #[test]
    fn test_cert_info_parse() {
        let info = CertInfo::parse(&cert_info(TPM_GENERATED_VALUE, 0x8017, &[1, 2, 3])).unwrap();
        assert_eq!(info.qualified_signer, vec![0xaa, 0xbb]);
        assert_eq!(info.extra_data, vec![1, 2, 3]);
    }

    #[test]
    fn test_cert_info_rejects_bad_header() {
        assert!(matches!(
            CertInfo::parse(&cert_info([0xff, 0x54, 0x43, 0x48], 0x8017, &[])),
            Err(WebAuthnError::InvalidData(_))
        ));
        assert!(matches!(
            CertInfo::parse(&cert_info(TPM_GENERATED_VALUE, 0x8018, &[])),
            Err(WebAuthnError::InvalidData(_))
        ));
        assert!(matches!(
            CertInfo::parse(&TPM_GENERATED_VALUE),
            Err(WebAuthnError::BufferError(_))
        ));
    }
}
