//! Minimal X.509 v3 certificate builder
//!
//! Produces ECDSA P-256/SHA-256 signed certificates with just the fields
//! attestation formats look at: names, validity, public key and extensions.

use p256::ecdsa::SigningKey;

use super::fixtures;
use crate::der;

const TAG_BOOLEAN: u8 = 0x01;
const TAG_OCTET_STRING: u8 = 0x04;
const TAG_UTF8_STRING: u8 = 0x0c;
const TAG_UTC_TIME: u8 = 0x17;
const TAG_SET: u8 = 0x31;
const TAG_EXPLICIT_VERSION: u8 = 0xa0;
const TAG_EXPLICIT_EXTENSIONS: u8 = 0xa3;

// 1.2.840.10045.4.3.2 ecdsa-with-SHA256
const OID_ECDSA_WITH_SHA256: &[u8] = &[0x2a, 0x86, 0x48, 0xce, 0x3d, 0x04, 0x03, 0x02];
const OID_COMMON_NAME: &[u8] = &[0x55, 0x04, 0x03];
const OID_ORGANIZATION: &[u8] = &[0x55, 0x04, 0x0a];
const OID_ORGANIZATIONAL_UNIT: &[u8] = &[0x55, 0x04, 0x0b];
const OID_BASIC_CONSTRAINTS: &[u8] = &[0x55, 0x1d, 0x13];

/// 1.3.6.1.4.1.11129.2.1.17 Android key description
pub const OID_ANDROID_KEY_DESCRIPTION: &[u8] =
    &[0x2b, 0x06, 0x01, 0x04, 0x01, 0xd6, 0x79, 0x02, 0x01, 0x11];

/// 1.2.840.113635.100.8.2 Apple anonymous attestation nonce
pub const OID_APPLE_NONCE: &[u8] = &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x63, 0x64, 0x08, 0x02];

/// Subject or issuer name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    common_name: Option<String>,
    organization: Option<String>,
    organizational_unit: Option<String>,
}

impl DistinguishedName {
    #[must_use]
    pub fn new(common_name: &str) -> Self {
        Self {
            common_name: Some(common_name.to_string()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn organization(mut self, organization: &str) -> Self {
        self.organization = Some(organization.to_string());
        self
    }

    #[must_use]
    pub fn organizational_unit(mut self, unit: &str) -> Self {
        self.organizational_unit = Some(unit.to_string());
        self
    }

    fn to_der(&self) -> Vec<u8> {
        let attributes = [
            (OID_ORGANIZATION, &self.organization),
            (OID_ORGANIZATIONAL_UNIT, &self.organizational_unit),
            (OID_COMMON_NAME, &self.common_name),
        ];

        let rdns: Vec<u8> = attributes
            .iter()
            .filter_map(|(oid, value)| value.as_ref().map(|v| (oid, v)))
            .flat_map(|(oid, value)| {
                let attr = der::sequence(
                    &[
                        der::oid(oid),
                        der::tlv(TAG_UTF8_STRING, value.as_bytes()),
                    ]
                    .concat(),
                );
                der::tlv(TAG_SET, &attr)
            })
            .collect();

        der::sequence(&rdns)
    }
}

/// Builder for a signed DER certificate
#[derive(Debug, Clone)]
pub struct CertificateBuilder {
    subject: DistinguishedName,
    issuer: Option<DistinguishedName>,
    public_key: Option<Vec<u8>>,
    not_before: &'static str,
    not_after: &'static str,
    serial: u8,
    extensions: Vec<Vec<u8>>,
}

impl CertificateBuilder {
    /// Self-issued certificate for `subject`, valid 2025 through 2049
    #[must_use]
    pub fn new(subject: DistinguishedName) -> Self {
        Self {
            subject,
            issuer: None,
            public_key: None,
            not_before: "250101000000Z",
            not_after: "491231235959Z",
            serial: 1,
            extensions: Vec::new(),
        }
    }

    #[must_use]
    pub fn issued_by(mut self, issuer: DistinguishedName) -> Self {
        self.issuer = Some(issuer);
        self
    }

    /// Certify a different key than the signing key (DER `SubjectPublicKeyInfo`)
    #[must_use]
    pub fn public_key(mut self, spki: &[u8]) -> Self {
        self.public_key = Some(spki.to_vec());
        self
    }

    /// Validity period that ended in 2020
    #[must_use]
    pub const fn expired(mut self) -> Self {
        self.not_before = "200101000000Z";
        self.not_after = "201231235959Z";
        self
    }

    #[must_use]
    pub const fn serial(mut self, serial: u8) -> Self {
        self.serial = serial;
        self
    }

    /// Mark as a CA with a critical basic constraints extension
    #[must_use]
    pub fn ca(self) -> Self {
        let value = der::sequence(&der::tlv(TAG_BOOLEAN, &[0xff]));
        self.raw_extension(OID_BASIC_CONSTRAINTS, true, &value)
    }

    /// Non-critical extension with an already encoded OID and value
    #[must_use]
    pub fn extension(self, oid: &[u8], value: &[u8]) -> Self {
        self.raw_extension(oid, false, value)
    }

    fn raw_extension(mut self, oid: &[u8], critical: bool, value: &[u8]) -> Self {
        let mut contents = der::oid(oid);
        if critical {
            contents.extend_from_slice(&der::tlv(TAG_BOOLEAN, &[0xff]));
        }
        contents.extend_from_slice(&der::tlv(TAG_OCTET_STRING, value));
        self.extensions.push(der::sequence(&contents));
        self
    }

    /// Sign with `issuer_key`
    #[must_use]
    pub fn sign(&self, issuer_key: &SigningKey) -> Vec<u8> {
        let algorithm = der::sequence(&der::oid(OID_ECDSA_WITH_SHA256));
        let issuer = self.issuer.as_ref().unwrap_or(&self.subject);
        let spki = self
            .public_key
            .clone()
            .unwrap_or_else(|| fixtures::es256_key(issuer_key).to_der());

        let mut tbs = Vec::new();
        tbs.extend_from_slice(&der::tlv(TAG_EXPLICIT_VERSION, &der::unsigned_integer(&[2])));
        tbs.extend_from_slice(&der::unsigned_integer(&[self.serial]));
        tbs.extend_from_slice(&algorithm);
        tbs.extend_from_slice(&issuer.to_der());
        tbs.extend_from_slice(&der::sequence(
            &[
                der::tlv(TAG_UTC_TIME, self.not_before.as_bytes()),
                der::tlv(TAG_UTC_TIME, self.not_after.as_bytes()),
            ]
            .concat(),
        ));
        tbs.extend_from_slice(&self.subject.to_der());
        tbs.extend_from_slice(&spki);
        if !self.extensions.is_empty() {
            tbs.extend_from_slice(&der::tlv(
                TAG_EXPLICIT_EXTENSIONS,
                &der::sequence(&self.extensions.concat()),
            ));
        }
        let tbs = der::sequence(&tbs);

        let signature = fixtures::sign_es256(issuer_key, &tbs);
        der::sequence(&[tbs, algorithm, der::bit_string(&signature)].concat())
    }
}

/// DER OCTET STRING, for extension payloads
#[must_use]
pub fn octet_string(value: &[u8]) -> Vec<u8> {
    der::tlv(TAG_OCTET_STRING, value)
}

/// Android key description with `challenge` as its attestationChallenge
#[must_use]
pub fn android_key_description(challenge: &[u8]) -> Vec<u8> {
    const TAG_ENUMERATED: u8 = 0x0a;
    der::sequence(
        &[
            der::unsigned_integer(&[3]),
            der::tlv(TAG_ENUMERATED, &[1]),
            der::unsigned_integer(&[4]),
            der::tlv(TAG_ENUMERATED, &[1]),
            octet_string(challenge),
            octet_string(&[]),
            der::sequence(&[]),
            der::sequence(&[]),
        ]
        .concat(),
    )
}

/// Apple anonymous attestation nonce extension value
#[must_use]
pub fn apple_nonce_extension(nonce: &[u8; 32]) -> Vec<u8> {
    let explicit = der::tlv(0xa1, &octet_string(nonce));
    der::sequence(&explicit)
}
