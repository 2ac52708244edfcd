//! Fluent builders for authenticator output
//!
//! Defaults describe a plain user-present assertion for the test RP; each
//! setter overrides one field.

use ciborium::value::{Integer, Value};

use super::fixtures;
use crate::authenticator_data::Flags;

/// Builder for raw authenticator data
#[derive(Debug, Clone)]
pub struct AuthDataBuilder {
    rp_id_hash: [u8; 32],
    flags: u8,
    sign_count: u32,
    attested: Option<Vec<u8>>,
    extensions: Option<Vec<u8>>,
}

impl AuthDataBuilder {
    /// Authenticator data for `rp_id` with only the user-present flag set
    #[must_use]
    pub fn new(rp_id: &str) -> Self {
        Self {
            rp_id_hash: fixtures::rp_id_hash(rp_id),
            flags: Flags::USER_PRESENT,
            sign_count: 0,
            attested: None,
            extensions: None,
        }
    }

    #[must_use]
    pub const fn rp_id_hash(mut self, hash: [u8; 32]) -> Self {
        self.rp_id_hash = hash;
        self
    }

    /// Replace the UP/UV/BE/BS flags; AT and ED follow the attached data
    #[must_use]
    pub const fn flags(mut self, flags: u8) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub const fn sign_count(mut self, count: u32) -> Self {
        self.sign_count = count;
        self
    }

    /// Attach attested credential data with an already encoded COSE key
    ///
    /// # Panics
    ///
    /// Panics if `credential_id` is longer than `u16::MAX` bytes.
    #[must_use]
    pub fn attested_credential(
        mut self,
        aaguid: [u8; 16],
        credential_id: &[u8],
        cose_key: &[u8],
    ) -> Self {
        let id_len = u16::try_from(credential_id.len()).expect("credential ID fits u16");
        let mut data = Vec::with_capacity(18 + credential_id.len() + cose_key.len());
        data.extend_from_slice(&aaguid);
        data.extend_from_slice(&id_len.to_be_bytes());
        data.extend_from_slice(credential_id);
        data.extend_from_slice(cose_key);
        self.attested = Some(data);
        self
    }

    /// Attach already encoded extension CBOR
    #[must_use]
    pub fn extensions(mut self, cbor: &[u8]) -> Self {
        self.extensions = Some(cbor.to_vec());
        self
    }

    #[must_use]
    pub fn build(&self) -> Vec<u8> {
        let mut flags = self.flags & !(Flags::ATTESTED_DATA | Flags::EXTENSION_DATA);
        if self.attested.is_some() {
            flags |= Flags::ATTESTED_DATA;
        }
        if self.extensions.is_some() {
            flags |= Flags::EXTENSION_DATA;
        }

        let mut out = Vec::with_capacity(37);
        out.extend_from_slice(&self.rp_id_hash);
        out.push(flags);
        out.extend_from_slice(&self.sign_count.to_be_bytes());
        if let Some(attested) = &self.attested {
            out.extend_from_slice(attested);
        }
        if let Some(extensions) = &self.extensions {
            out.extend_from_slice(extensions);
        }
        out
    }
}

/// Builder for a CBOR attestation object
#[derive(Debug, Clone)]
pub struct AttestationObjectBuilder {
    fmt: Value,
    statement: Vec<(Value, Value)>,
    auth_data: Value,
}

impl AttestationObjectBuilder {
    #[must_use]
    pub fn new(fmt: &str, auth_data: &[u8]) -> Self {
        Self {
            fmt: Value::Text(fmt.to_string()),
            statement: Vec::new(),
            auth_data: Value::Bytes(auth_data.to_vec()),
        }
    }

    /// Add an `attStmt` entry
    #[must_use]
    pub fn statement(mut self, key: &str, value: Value) -> Self {
        self.statement.push((Value::Text(key.to_string()), value));
        self
    }

    /// Replace `fmt` with an arbitrary CBOR value
    #[must_use]
    pub fn raw_fmt(mut self, fmt: Value) -> Self {
        self.fmt = fmt;
        self
    }

    /// Replace `authData` with an arbitrary CBOR value
    #[must_use]
    pub fn raw_auth_data(mut self, auth_data: Value) -> Self {
        self.auth_data = auth_data;
        self
    }

    #[must_use]
    pub fn build(&self) -> Vec<u8> {
        fixtures::to_cbor(&Value::Map(vec![
            (Value::Text("fmt".to_string()), self.fmt.clone()),
            (
                Value::Text("attStmt".to_string()),
                Value::Map(self.statement.clone()),
            ),
            (Value::Text("authData".to_string()), self.auth_data.clone()),
        ]))
    }
}

#[must_use]
pub fn cbor_int(value: i64) -> Value {
    Value::Integer(Integer::from(value))
}

#[must_use]
pub fn cbor_bytes(value: &[u8]) -> Value {
    Value::Bytes(value.to_vec())
}

#[must_use]
pub fn cbor_text(value: &str) -> Value {
    Value::Text(value.to_string())
}

/// `x5c` array of DER certificates
#[must_use]
pub fn cbor_x5c(certs: &[Vec<u8>]) -> Value {
    Value::Array(certs.iter().map(|c| Value::Bytes(c.clone())).collect())
}
