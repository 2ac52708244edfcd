//! Testing utilities for passkey-core
//!
//! Builders for authenticator data, attestation objects and X.509
//! certificates, plus deterministic signing keys, so every attestation format
//! can be exercised without captured authenticator output.
//!
//! ## Organization
//!
//! - [`fixtures`] - Signing keys, COSE keys and clientDataJSON
//! - [`builders`] - Authenticator data and attestation object builders
//! - [`certificates`] - Minimal X.509 certificate builder
//! - [`assertions`] - Assertion helpers for error kinds
//!
//! ## Usage
//!
//! ```rust,ignore
//! use passkey_core::testing::{builders::AuthDataBuilder, constants::RP_ID, fixtures};
//!
//! let key = fixtures::es256_signing_key();
//! let auth_data = AuthDataBuilder::new(RP_ID)
//!     .attested_credential([0; 16], b"credential", &fixtures::es256_cose_key(&key))
//!     .build();
//! assert!(auth_data.len() > 55);
//! ```

pub mod assertions;
pub mod builders;
pub mod certificates;
pub mod fixtures;

pub use assertions::*;
pub use builders::{AttestationObjectBuilder, AuthDataBuilder};
pub use certificates::{CertificateBuilder, DistinguishedName};

/// Common test constants
pub mod constants {
    /// Relying party ID used across tests
    pub const RP_ID: &str = "example.com";

    /// Origin matching [`RP_ID`]
    pub const ORIGIN: &str = "https://example.com";

    /// Relying party display name
    pub const RP_NAME: &str = "Example";

    /// Credential ID of the test authenticator
    pub const CREDENTIAL_ID: &[u8] = b"test-credential-0001";

    /// AAGUID of the test authenticator
    pub const AAGUID: [u8; 16] = [
        0xf8, 0xa0, 0x11, 0xf3, 0x8c, 0x0a, 0x4d, 0x15, 0x80, 0x06, 0x17, 0x11, 0x1f, 0x9e, 0xdc,
        0x7d,
    ];
}
