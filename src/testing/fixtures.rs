//! Test fixtures: deterministic keys, COSE encodings and clientDataJSON
//!
//! Keys are derived from fixed seeds so failures reproduce exactly.

use ciborium::value::{Integer, Value};
use p256::ecdsa::signature::Signer;
use p256::ecdsa::SigningKey;

use crate::cose::CoseKey;
use crate::crypto;

/// Deterministic P-256 key; `seed` must be non-zero
///
/// # Panics
///
/// Panics if `seed` is zero.
#[must_use]
pub fn p256_signing_key(seed: u8) -> SigningKey {
    SigningKey::from_slice(&[seed; 32]).expect("non-zero seed is a valid P-256 scalar")
}

/// The credential key of the test authenticator
#[must_use]
pub fn es256_signing_key() -> SigningKey {
    p256_signing_key(7)
}

#[must_use]
pub fn ed25519_signing_key() -> ed25519_dalek::SigningKey {
    ed25519_dalek::SigningKey::from_bytes(&[9; 32])
}

/// COSE model of a P-256 verifying key
///
/// # Panics
///
/// Panics if the encoded point lacks coordinates, which cannot happen for
/// an uncompressed point.
#[must_use]
pub fn es256_key(key: &SigningKey) -> CoseKey {
    let point = key.verifying_key().to_encoded_point(false);
    CoseKey::Ec2 {
        x: point.x().expect("uncompressed point has x").to_vec(),
        y: point.y().expect("uncompressed point has y").to_vec(),
    }
}

#[must_use]
pub fn ed25519_key(key: &ed25519_dalek::SigningKey) -> CoseKey {
    CoseKey::Okp {
        x: key.verifying_key().to_bytes().to_vec(),
    }
}

/// RSA key with a synthetic 2048-bit modulus, only usable for parsing
#[must_use]
pub fn rsa_key() -> CoseKey {
    let mut n = vec![0xc5; 256];
    n[255] = 0x01;
    CoseKey::Rsa {
        n,
        e: vec![0x01, 0x00, 0x01],
    }
}

fn int(value: i64) -> Value {
    Value::Integer(Integer::from(value))
}

/// COSE map for any [`CoseKey`]
#[must_use]
pub fn cose_value(key: &CoseKey) -> Value {
    let entries = match key {
        CoseKey::Ec2 { x, y } => vec![
            (int(1), int(2)),
            (int(3), int(-7)),
            (int(-1), int(1)),
            (int(-2), Value::Bytes(x.clone())),
            (int(-3), Value::Bytes(y.clone())),
        ],
        CoseKey::Rsa { n, e } => vec![
            (int(1), int(3)),
            (int(3), int(-257)),
            (int(-1), Value::Bytes(n.clone())),
            (int(-2), Value::Bytes(e.clone())),
        ],
        CoseKey::Okp { x } => vec![
            (int(1), int(1)),
            (int(3), int(-8)),
            (int(-1), int(6)),
            (int(-2), Value::Bytes(x.clone())),
        ],
    };
    Value::Map(entries)
}

/// Serialize a CBOR value
///
/// # Panics
///
/// Panics if serialization into a `Vec` fails.
#[must_use]
pub fn to_cbor(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    ciborium::ser::into_writer(value, &mut out).expect("CBOR serialization into Vec");
    out
}

#[must_use]
pub fn es256_cose_key(key: &SigningKey) -> Vec<u8> {
    to_cbor(&cose_value(&es256_key(key)))
}

#[must_use]
pub fn ed25519_cose_key(key: &ed25519_dalek::SigningKey) -> Vec<u8> {
    to_cbor(&cose_value(&ed25519_key(key)))
}

#[must_use]
pub fn rsa_cose_key() -> Vec<u8> {
    to_cbor(&cose_value(&rsa_key()))
}

#[must_use]
pub fn rp_id_hash(rp_id: &str) -> [u8; 32] {
    crypto::sha256(rp_id.as_bytes())
}

/// DER encoded ES256 signature over `message`
#[must_use]
pub fn sign_es256(key: &SigningKey, message: &[u8]) -> Vec<u8> {
    let signature: p256::ecdsa::Signature = key.sign(message);
    signature.to_der().as_bytes().to_vec()
}

#[must_use]
pub fn sign_ed25519(key: &ed25519_dalek::SigningKey, message: &[u8]) -> Vec<u8> {
    use ed25519_dalek::Signer as _;
    key.sign(message).to_bytes().to_vec()
}

/// clientDataJSON bytes as a browser would send them
#[must_use]
pub fn client_data_json(kind: &str, challenge: &[u8], origin: &str) -> Vec<u8> {
    serde_json::json!({
        "type": kind,
        "challenge": crate::buffer::ByteBuffer::to_base64url(challenge),
        "origin": origin,
        "crossOrigin": false,
    })
    .to_string()
    .into_bytes()
}

/// `authData || SHA-256(clientDataJSON)`, the message attestation signatures cover
#[must_use]
pub fn signed_data(auth_data: &[u8], client_data_json: &[u8]) -> Vec<u8> {
    [auth_data, &crypto::sha256(client_data_json)].concat()
}
