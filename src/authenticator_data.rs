//! Authenticator data parsing
//!
//! Layout (all offsets in bytes):
//!
//! | offset | size | field                                   |
//! |--------|------|-----------------------------------------|
//! | 0      | 32   | SHA-256 of the RP ID                    |
//! | 32     | 1    | flags                                   |
//! | 33     | 4    | signature counter, big-endian           |
//! | 37     | 16   | AAGUID (attested credential data only)  |
//! | 53     | 2    | credential ID length L                  |
//! | 55     | L    | credential ID                           |
//! | 55 + L | var  | COSE public key, then extensions (CBOR) |

use uuid::Uuid;

use crate::buffer::ByteBuffer;
use crate::cbor::{self, CborValue};
use crate::cose::CoseKey;
use crate::error::{Result, WebAuthnError};

const RP_ID_HASH_LEN: usize = 32;
const FLAGS_OFFSET: usize = 32;
const SIGN_COUNT_OFFSET: usize = 33;
const MIN_LEN: usize = 37;
const AAGUID_OFFSET: usize = 37;
const AAGUID_LEN: usize = 16;
const CREDENTIAL_ID_LEN_OFFSET: usize = 53;
const CREDENTIAL_ID_OFFSET: usize = 55;

/// Authenticator data flag bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Flags(u8);

impl Flags {
    pub const USER_PRESENT: u8 = 0x01;
    pub const USER_VERIFIED: u8 = 0x04;
    pub const BACKUP_ELIGIBLE: u8 = 0x08;
    pub const BACKED_UP: u8 = 0x10;
    pub const ATTESTED_DATA: u8 = 0x40;
    pub const EXTENSION_DATA: u8 = 0x80;

    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn user_present(self) -> bool {
        self.0 & Self::USER_PRESENT != 0
    }

    #[must_use]
    pub const fn user_verified(self) -> bool {
        self.0 & Self::USER_VERIFIED != 0
    }

    #[must_use]
    pub const fn backup_eligible(self) -> bool {
        self.0 & Self::BACKUP_ELIGIBLE != 0
    }

    #[must_use]
    pub const fn backed_up(self) -> bool {
        self.0 & Self::BACKED_UP != 0
    }

    #[must_use]
    pub const fn attested_data_included(self) -> bool {
        self.0 & Self::ATTESTED_DATA != 0
    }

    #[must_use]
    pub const fn extension_data_included(self) -> bool {
        self.0 & Self::EXTENSION_DATA != 0
    }
}

/// Credential created during registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestedCredentialData {
    pub aaguid: [u8; AAGUID_LEN],
    pub credential_id: Vec<u8>,
    pub public_key: CoseKey,
}

/// Parsed authenticator data, keeping the raw bytes for signature checks
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatorData {
    raw: Vec<u8>,
    rp_id_hash: [u8; RP_ID_HASH_LEN],
    flags: Flags,
    sign_count: u32,
    attested_credential_data: Option<AttestedCredentialData>,
    extensions: Option<CborValue>,
}

impl AuthenticatorData {
    /// Parse raw authenticator data
    ///
    /// # Errors
    /// Returns `InvalidData` if the data is too short, `InvalidPublicKey` if
    /// the credential key is not a supported COSE key and `CborError` or
    /// `BufferError` for malformed embedded CBOR
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < MIN_LEN {
            return Err(WebAuthnError::invalid_data(format!(
                "Authenticator data too short: {} bytes",
                bytes.len()
            )));
        }

        let buf = ByteBuffer::new(bytes);

        let mut rp_id_hash = [0u8; RP_ID_HASH_LEN];
        rp_id_hash.copy_from_slice(buf.bytes(0, RP_ID_HASH_LEN)?);

        let flags = Flags::from_bits(buf.byte_at(FLAGS_OFFSET)?);

        let mut count = [0u8; 4];
        count.copy_from_slice(buf.bytes(SIGN_COUNT_OFFSET, 4)?);
        let sign_count = u32::from_be_bytes(count);

        let mut offset = MIN_LEN;
        let attested_credential_data = if flags.attested_data_included() {
            let (data, end) = Self::parse_attested_data(&buf)?;
            offset = end;
            Some(data)
        } else {
            None
        };

        let extensions = if flags.extension_data_included() {
            Some(cbor::decode(buf.bytes(offset, buf.len() - offset)?)?)
        } else {
            None
        };

        log::trace!(
            "Parsed authenticator data: flags={:#04x} sign_count={sign_count} attested={} extensions={}",
            flags.bits(),
            attested_credential_data.is_some(),
            extensions.is_some()
        );

        Ok(Self {
            raw: bytes.to_vec(),
            rp_id_hash,
            flags,
            sign_count,
            attested_credential_data,
            extensions,
        })
    }

    fn parse_attested_data(buf: &ByteBuffer<'_>) -> Result<(AttestedCredentialData, usize)> {
        if buf.len() <= CREDENTIAL_ID_OFFSET {
            return Err(WebAuthnError::invalid_data(
                "Attested credential data flag set but data too short",
            ));
        }

        let mut aaguid = [0u8; AAGUID_LEN];
        aaguid.copy_from_slice(buf.bytes(AAGUID_OFFSET, AAGUID_LEN)?);

        let id_len = usize::from(buf.u16_be(CREDENTIAL_ID_LEN_OFFSET)?);
        let credential_id = buf.bytes(CREDENTIAL_ID_OFFSET, id_len)?.to_vec();

        let (key, end) = cbor::decode_in_place(buf.as_slice(), CREDENTIAL_ID_OFFSET + id_len)?;
        let public_key = CoseKey::from_cbor(&key)?;

        Ok((
            AttestedCredentialData {
                aaguid,
                credential_id,
                public_key,
            },
            end,
        ))
    }

    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    #[must_use]
    pub const fn rp_id_hash(&self) -> &[u8; RP_ID_HASH_LEN] {
        &self.rp_id_hash
    }

    #[must_use]
    pub const fn flags(&self) -> Flags {
        self.flags
    }

    #[must_use]
    pub const fn sign_count(&self) -> u32 {
        self.sign_count
    }

    #[must_use]
    pub const fn user_present(&self) -> bool {
        self.flags.user_present()
    }

    #[must_use]
    pub const fn user_verified(&self) -> bool {
        self.flags.user_verified()
    }

    #[must_use]
    pub const fn is_backup_eligible(&self) -> bool {
        self.flags.backup_eligible()
    }

    #[must_use]
    pub const fn is_backup(&self) -> bool {
        self.flags.backed_up()
    }

    #[must_use]
    pub const fn attested_credential_data(&self) -> Option<&AttestedCredentialData> {
        self.attested_credential_data.as_ref()
    }

    #[must_use]
    pub const fn extensions(&self) -> Option<&CborValue> {
        self.extensions.as_ref()
    }

    fn require_attested(&self) -> Result<&AttestedCredentialData> {
        self.attested_credential_data
            .as_ref()
            .ok_or_else(|| WebAuthnError::invalid_data("No attested credential data"))
    }

    /// # Errors
    /// Returns `InvalidData` when no attested credential data is present
    pub fn credential_id(&self) -> Result<&[u8]> {
        Ok(&self.require_attested()?.credential_id)
    }

    /// # Errors
    /// Returns `InvalidData` when no attested credential data is present
    pub fn public_key(&self) -> Result<&CoseKey> {
        Ok(&self.require_attested()?.public_key)
    }

    /// # Errors
    /// Returns `InvalidData` when no attested credential data is present
    pub fn public_key_der(&self) -> Result<Vec<u8>> {
        Ok(self.public_key()?.to_der())
    }

    /// # Errors
    /// Returns `InvalidData` when no attested credential data is present
    pub fn public_key_pem(&self) -> Result<String> {
        Ok(self.public_key()?.to_pem())
    }

    /// `0x04 || x || y` for EC2 credential keys
    ///
    /// # Errors
    /// Returns `InvalidData` without attested credential data and
    /// `InvalidPublicKey` for non-EC2 keys
    pub fn public_key_u2f(&self) -> Result<Vec<u8>> {
        self.public_key()?
            .u2f_public_key()
            .ok_or_else(|| WebAuthnError::invalid_public_key("Credential key is not an EC2 key"))
    }

    /// # Errors
    /// Returns `InvalidData` when no attested credential data is present
    pub fn aaguid(&self) -> Result<&[u8; AAGUID_LEN]> {
        Ok(&self.require_attested()?.aaguid)
    }

    /// AAGUID as lowercase hex
    ///
    /// # Errors
    /// Returns `InvalidData` when no attested credential data is present
    pub fn aaguid_hex(&self) -> Result<String> {
        Ok(hex::encode(self.aaguid()?))
    }

    /// AAGUID as a hyphenated UUID string
    ///
    /// # Errors
    /// Returns `InvalidData` when no attested credential data is present
    pub fn aaguid_uuid(&self) -> Result<String> {
        Ok(Uuid::from_bytes(*self.aaguid()?).hyphenated().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, AuthDataBuilder};

    #[test]
    fn test_flag_bits_are_independent() {
        let cases = [
            (0x01, [true, false, false, false, false, false]),
            (0x04, [false, true, false, false, false, false]),
            (0x08, [false, false, true, false, false, false]),
            (0x10, [false, false, false, true, false, false]),
            (0x40, [false, false, false, false, true, false]),
            (0x80, [false, false, false, false, false, true]),
            (0x22, [false; 6]),
        ];

        for (bits, expected) in cases {
            let flags = Flags::from_bits(bits);
            assert_eq!(
                [
                    flags.user_present(),
                    flags.user_verified(),
                    flags.backup_eligible(),
                    flags.backed_up(),
                    flags.attested_data_included(),
                    flags.extension_data_included(),
                ],
                expected,
                "flags {bits:#04x}"
            );
        }
    }

    #[test]
    fn test_short_data_rejected() {
        for len in 0..MIN_LEN {
            assert!(matches!(
                AuthenticatorData::parse(&vec![0u8; len]),
                Err(WebAuthnError::InvalidData(_))
            ));
        }
    }

    #[test]
    fn test_attested_flag_with_short_data_rejected() {
        for len in MIN_LEN..=CREDENTIAL_ID_OFFSET {
            let mut data = vec![0u8; len];
            data[FLAGS_OFFSET] = Flags::ATTESTED_DATA;
            assert!(matches!(
                AuthenticatorData::parse(&data),
                Err(WebAuthnError::InvalidData(_))
            ));
        }
    }

    #[test]
    fn test_parse_assertion_data() {
        let data = AuthDataBuilder::new("example.com")
            .flags(Flags::USER_PRESENT | Flags::USER_VERIFIED)
            .sign_count(0x0102_0304)
            .build();

        let parsed = AuthenticatorData::parse(&data).unwrap();
        assert_eq!(parsed.rp_id_hash(), &fixtures::rp_id_hash("example.com"));
        assert_eq!(parsed.sign_count(), 0x0102_0304);
        assert!(parsed.user_present());
        assert!(parsed.user_verified());
        assert!(!parsed.is_backup_eligible());
        assert!(parsed.attested_credential_data().is_none());
        assert!(matches!(
            parsed.credential_id(),
            Err(WebAuthnError::InvalidData(_))
        ));
        assert_eq!(parsed.raw(), data.as_slice());
    }

    #[test]
    fn test_sign_count_uses_full_range() {
        let data = AuthDataBuilder::new("example.com")
            .sign_count(0xffff_fffe)
            .build();
        assert_eq!(
            AuthenticatorData::parse(&data).unwrap().sign_count(),
            0xffff_fffe
        );
    }

    #[test]
    fn test_parse_attested_credential() {
        let key = fixtures::es256_signing_key();
        let aaguid = [
            0xad, 0xce, 0x00, 0x02, 0x35, 0xbc, 0xc6, 0x0a, 0x64, 0x8b, 0x0b, 0x25, 0xf1, 0xf0,
            0x55, 0x03,
        ];
        let data = AuthDataBuilder::new("example.com")
            .flags(Flags::USER_PRESENT | Flags::BACKUP_ELIGIBLE | Flags::BACKED_UP)
            .attested_credential(aaguid, b"credential-1", &fixtures::es256_cose_key(&key))
            .build();

        let parsed = AuthenticatorData::parse(&data).unwrap();
        assert_eq!(parsed.credential_id().unwrap(), b"credential-1");
        assert!(parsed.is_backup_eligible());
        assert!(parsed.is_backup());
        assert_eq!(parsed.aaguid_hex().unwrap(), "adce000235bcc60a648b0b25f1f05503");
        assert_eq!(
            parsed.aaguid_uuid().unwrap(),
            "adce0002-35bc-c60a-648b-0b25f1f05503"
        );
        assert_eq!(parsed.public_key_u2f().unwrap().len(), 65);
        assert!(parsed
            .public_key_pem()
            .unwrap()
            .contains("BEGIN PUBLIC KEY"));
    }

    #[test]
    fn test_parse_extensions_after_credential() {
        let key = fixtures::ed25519_signing_key();
        // {"credProtect": 2}
        let extensions = [
            0xa1, 0x6b, 0x63, 0x72, 0x65, 0x64, 0x50, 0x72, 0x6f, 0x74, 0x65, 0x63, 0x74, 0x02,
        ];
        let data = AuthDataBuilder::new("example.com")
            .attested_credential([0; 16], b"id", &fixtures::ed25519_cose_key(&key))
            .extensions(&extensions)
            .build();

        let parsed = AuthenticatorData::parse(&data).unwrap();
        assert_eq!(
            parsed.extensions().and_then(|e| e.get("credProtect")),
            Some(&CborValue::Unsigned(2))
        );
        assert!(parsed.public_key_u2f().is_err());
    }

    #[test]
    fn test_trailing_bytes_without_extension_flag_ignored() {
        let mut data = AuthDataBuilder::new("example.com").build();
        data.extend_from_slice(&[0xde, 0xad]);
        assert!(AuthenticatorData::parse(&data).is_ok());
    }

    #[test]
    fn test_credential_id_past_end_fails() {
        let mut data = vec![0u8; 60];
        data[FLAGS_OFFSET] = Flags::ATTESTED_DATA;
        data[CREDENTIAL_ID_LEN_OFFSET] = 0x01;
        assert!(matches!(
            AuthenticatorData::parse(&data),
            Err(WebAuthnError::BufferError(_))
        ));
    }
}
