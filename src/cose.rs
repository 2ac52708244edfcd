//! COSE public keys (RFC 9052/9053) as carried in attested credential data
//!
//! Only the three key shapes `WebAuthn` authenticators produce in practice are
//! accepted: EC2 P-256 with ES256, RSA with RS256 and OKP Ed25519 with `EdDSA`.

use crate::cbor::{CborKey, CborMap, CborValue};
use crate::der;
use crate::error::{Result, WebAuthnError};

const LABEL_KTY: i64 = 1;
const LABEL_ALG: i64 = 3;
const LABEL_CRV: i64 = -1;
const LABEL_X: i64 = -2;
const LABEL_Y: i64 = -3;
const LABEL_N: i64 = -1;
const LABEL_E: i64 = -2;

const KTY_OKP: i64 = 1;
const KTY_EC2: i64 = 2;
const KTY_RSA: i64 = 3;

const CRV_P256: i64 = 1;
const CRV_ED25519: i64 = 6;

const RSA_MODULUS_LEN: usize = 256;
const RSA_EXPONENT_LEN: usize = 3;

// 1.2.840.10045.2.1 id-ecPublicKey
const OID_EC_PUBLIC_KEY: &[u8] = &[0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01];
// 1.2.840.10045.3.1.7 prime256v1
const OID_PRIME256V1: &[u8] = &[0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07];
// 1.2.840.113549.1.1.1 rsaEncryption
const OID_RSA_ENCRYPTION: &[u8] = &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x01, 0x01];
// 1.3.101.112 id-Ed25519
const OID_ED25519: &[u8] = &[0x2b, 0x65, 0x70];

/// COSE algorithm identifiers accepted for credentials and attestation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoseAlgorithm {
    /// ECDSA P-256 with SHA-256
    Es256,
    /// `EdDSA` over Ed25519
    EdDsa,
    /// RSASSA-PKCS1-v1_5 with SHA-256
    Rs256,
}

impl CoseAlgorithm {
    /// Algorithms in the order offered to authenticators
    pub const ALL: [Self; 3] = [Self::EdDsa, Self::Es256, Self::Rs256];

    #[must_use]
    pub const fn from_i64(value: i64) -> Option<Self> {
        match value {
            -7 => Some(Self::Es256),
            -8 => Some(Self::EdDsa),
            -257 => Some(Self::Rs256),
            _ => None,
        }
    }

    #[must_use]
    pub const fn value(self) -> i64 {
        match self {
            Self::Es256 => -7,
            Self::EdDsa => -8,
            Self::Rs256 => -257,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Es256 => "ES256",
            Self::EdDsa => "EdDSA",
            Self::Rs256 => "RS256",
        }
    }
}

/// Credential public key decoded from its COSE map
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoseKey {
    /// Uncompressed P-256 point
    Ec2 { x: Vec<u8>, y: Vec<u8> },
    /// RSA modulus and public exponent, big-endian
    Rsa { n: Vec<u8>, e: Vec<u8> },
    /// Ed25519 public key
    Okp { x: Vec<u8> },
}

impl CoseKey {
    /// Build a key from a decoded COSE map
    ///
    /// # Errors
    /// Returns `InvalidPublicKey` when the key type, algorithm, curve or any
    /// coordinate is missing, unsupported or of the wrong size
    pub fn from_cbor(value: &CborValue) -> Result<Self> {
        let map = value
            .as_map()
            .ok_or_else(|| WebAuthnError::invalid_public_key("COSE key is not a map"))?;

        let kty = int_param(map, LABEL_KTY)
            .ok_or_else(|| WebAuthnError::invalid_public_key("Missing key type"))?;
        let alg = int_param(map, LABEL_ALG)
            .ok_or_else(|| WebAuthnError::invalid_public_key("Missing algorithm"))?;
        let alg = CoseAlgorithm::from_i64(alg).ok_or_else(|| {
            WebAuthnError::invalid_public_key(format!("Unsupported algorithm {alg}"))
        })?;

        match (kty, alg) {
            (KTY_EC2, CoseAlgorithm::Es256) => {
                expect_curve(map, CRV_P256)?;
                let x = sized_bytes(map, LABEL_X, 32, "x coordinate")?;
                let y = sized_bytes(map, LABEL_Y, 32, "y coordinate")?;
                Ok(Self::Ec2 { x, y })
            }
            (KTY_RSA, CoseAlgorithm::Rs256) => {
                let n = sized_bytes(map, LABEL_N, RSA_MODULUS_LEN, "RSA modulus")?;
                let e = sized_bytes(map, LABEL_E, RSA_EXPONENT_LEN, "RSA public exponent")?;
                Ok(Self::Rsa { n, e })
            }
            (KTY_OKP, CoseAlgorithm::EdDsa) => {
                expect_curve(map, CRV_ED25519)?;
                let x = sized_bytes(map, LABEL_X, 32, "Ed25519 key")?;
                Ok(Self::Okp { x })
            }
            (KTY_EC2 | KTY_RSA | KTY_OKP, alg) => Err(WebAuthnError::invalid_public_key(format!(
                "Algorithm {} does not match key type {kty}",
                alg.name()
            ))),
            _ => Err(WebAuthnError::invalid_public_key(format!(
                "Unsupported key type {kty}"
            ))),
        }
    }

    #[must_use]
    pub const fn algorithm(&self) -> CoseAlgorithm {
        match self {
            Self::Ec2 { .. } => CoseAlgorithm::Es256,
            Self::Rsa { .. } => CoseAlgorithm::Rs256,
            Self::Okp { .. } => CoseAlgorithm::EdDsa,
        }
    }

    /// DER `SubjectPublicKeyInfo`
    #[must_use]
    pub fn to_der(&self) -> Vec<u8> {
        match self {
            Self::Ec2 { .. } => {
                let algorithm = der::sequence(
                    &[der::oid(OID_EC_PUBLIC_KEY), der::oid(OID_PRIME256V1)].concat(),
                );
                let point = self.u2f_public_key().unwrap_or_default();
                der::sequence(&[algorithm, der::bit_string(&point)].concat())
            }
            Self::Rsa { n, e } => {
                let algorithm =
                    der::sequence(&[der::oid(OID_RSA_ENCRYPTION), der::null()].concat());
                let key = der::sequence(
                    &[der::unsigned_integer(n), der::unsigned_integer(e)].concat(),
                );
                der::sequence(&[algorithm, der::bit_string(&key)].concat())
            }
            Self::Okp { x } => {
                let algorithm = der::sequence(&der::oid(OID_ED25519));
                der::sequence(&[algorithm, der::bit_string(x)].concat())
            }
        }
    }

    /// PEM `PUBLIC KEY` armor of [`Self::to_der`]
    #[must_use]
    pub fn to_pem(&self) -> String {
        der::pem("PUBLIC KEY", &self.to_der())
    }

    /// Raw uncompressed point `0x04 || x || y`, only for EC2 keys
    #[must_use]
    pub fn u2f_public_key(&self) -> Option<Vec<u8>> {
        match self {
            Self::Ec2 { x, y } => {
                let mut point = Vec::with_capacity(65);
                point.push(0x04);
                point.extend_from_slice(x);
                point.extend_from_slice(y);
                Some(point)
            }
            _ => None,
        }
    }
}

fn int_param(map: &CborMap, label: i64) -> Option<i64> {
    map.get(&CborKey::Int(label)).and_then(CborValue::as_integer)
}

fn expect_curve(map: &CborMap, curve: i64) -> Result<()> {
    match int_param(map, LABEL_CRV) {
        Some(crv) if crv == curve => Ok(()),
        Some(crv) => Err(WebAuthnError::invalid_public_key(format!(
            "Unsupported curve {crv}"
        ))),
        None => Err(WebAuthnError::invalid_public_key("Missing curve")),
    }
}

fn sized_bytes(map: &CborMap, label: i64, len: usize, what: &str) -> Result<Vec<u8>> {
    let bytes = map
        .get(&CborKey::Int(label))
        .and_then(CborValue::as_bytes)
        .ok_or_else(|| WebAuthnError::invalid_public_key(format!("Missing {what}")))?;

    if bytes.len() != len {
        return Err(WebAuthnError::invalid_public_key(format!(
            "Invalid {what} length {}",
            bytes.len()
        )));
    }

    Ok(bytes.to_vec())
}
