#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![deny(warnings)]
#![allow(clippy::multiple_crate_versions)]

//! `WebAuthn`/FIDO2 passkey verification core
//!
//! Parses authenticator data, COSE keys and attestation objects, verifies
//! the seven standard attestation statement formats and runs the
//! registration and authentication ceremonies.

/// Version of the passkey-core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod attestation;
pub mod authenticator_data;
pub mod buffer;
pub mod cbor;
pub mod certificate;
pub mod client_data;
pub mod cose;
pub mod crypto;
pub mod der;
pub mod error;
pub mod service;
pub mod settings;
pub mod store;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Re-export commonly used items
pub use attestation::{AttestationFormat, AttestationObject};
pub use authenticator_data::AuthenticatorData;
pub use certificate::RootCertificates;
pub use error::WebAuthnError;
pub use service::WebAuthn;
pub use settings::{SettingsError, WebAuthnSettings};
pub use store::{CredentialStore, InMemoryCredentialStore, StoreError, StoredCredential};
pub use types::{AssertionResult, RegistrationResult};
