//! `WebAuthn` service implementation
//!
//! [`WebAuthn`] runs the registration (`process_create`) and authentication
//! (`process_get`) ceremonies and builds the options the browser needs to
//! start them. The service holds no per-ceremony state: challenges and
//! signature counters are passed in by the caller and results are returned,
//! so one instance can be shared across threads.

use crate::attestation::{AttestationFormat, AttestationObject};
use crate::authenticator_data::AuthenticatorData;
use crate::buffer::ByteBuffer;
use crate::certificate::RootCertificates;
use crate::client_data::{CeremonyType, ClientData, OriginPolicy};
use crate::cose::CoseAlgorithm;
use crate::crypto;
use crate::error::{Result, WebAuthnError};
use crate::settings::WebAuthnSettings;
use crate::types::{
    AssertionResult, AttestationConveyance, AuthenticationOptions, AuthenticatorSelectionCriteria,
    ChallengeState, PublicKeyCredentialDescriptor, RegistrationOptions, RegistrationResult,
    RelyingParty, Transport, UserEntity, UserVerification,
};

/// Core `WebAuthn` service
#[derive(Debug, Clone)]
pub struct WebAuthn {
    settings: WebAuthnSettings,
    formats: Vec<AttestationFormat>,
    rp_id_hash: [u8; 32],
    origin_policy: OriginPolicy,
    root_certificates: RootCertificates,
}

impl WebAuthn {
    /// Create a service for the relying party described by `settings`
    ///
    /// Root certificates named in the settings are loaded here.
    ///
    /// # Errors
    /// Returns `InvalidData` for an empty RP ID, an unknown or empty format
    /// list, or unreadable root certificates
    pub fn new(settings: WebAuthnSettings) -> Result<Self> {
        if settings.rp_id.trim().is_empty() {
            return Err(WebAuthnError::invalid_data("RP ID must not be empty"));
        }

        let formats = settings.attestation_formats()?;
        if formats.is_empty() {
            return Err(WebAuthnError::invalid_data(
                "At least one attestation format must be allowed",
            ));
        }

        let root_certificates = RootCertificates::load(&settings.root_certificate_paths)?;
        let origin_policy = OriginPolicy::new(
            &settings.rp_id,
            settings.android_key_hashes.clone(),
            settings.require_origin_label_boundary,
        )?;
        let rp_id_hash = crypto::sha256(settings.rp_id.as_bytes());

        log::debug!(
            "WebAuthn service for {} accepting formats: {}",
            settings.rp_id,
            formats
                .iter()
                .map(|format| format.name())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self {
            settings,
            formats,
            rp_id_hash,
            origin_policy,
            root_certificates,
        })
    }

    /// Replace the trust anchors used for attestation certificate validation
    #[must_use]
    pub fn with_root_certificates(mut self, root_certificates: RootCertificates) -> Self {
        self.root_certificates = root_certificates;
        self
    }

    #[must_use]
    pub const fn settings(&self) -> &WebAuthnSettings {
        &self.settings
    }

    #[must_use]
    pub const fn rp_id_hash(&self) -> &[u8; 32] {
        &self.rp_id_hash
    }

    #[must_use]
    pub fn allowed_formats(&self) -> &[AttestationFormat] {
        &self.formats
    }

    /// Attestation conveyance requested from the browser
    #[must_use]
    pub fn attestation_conveyance(&self) -> AttestationConveyance {
        if self.formats == [AttestationFormat::None] {
            AttestationConveyance::None
        } else if self.root_certificates.is_empty() {
            AttestationConveyance::Indirect
        } else {
            AttestationConveyance::Direct
        }
    }

    /// Build creation options for registering a new credential
    ///
    /// Credentials in `exclude_credentials` are listed with every transport so
    /// an authenticator that already holds one of them refuses to register again.
    ///
    /// # Errors
    /// Returns `CryptoStrong` if no challenge can be generated
    pub fn create_options(
        &self,
        user: UserEntity,
        authenticator_selection: AuthenticatorSelectionCriteria,
        exclude_credentials: &[Vec<u8>],
    ) -> Result<(RegistrationOptions, ChallengeState)> {
        let state = self.new_challenge()?;

        let options = RegistrationOptions {
            challenge: state.challenge.clone(),
            rp: RelyingParty {
                id: self.settings.rp_id.clone(),
                name: self.settings.rp_name.clone(),
            },
            user,
            pub_key_cred_params: CoseAlgorithm::ALL.into_iter().map(Into::into).collect(),
            timeout: self.settings.timeout_ms(),
            attestation: self.attestation_conveyance(),
            authenticator_selection,
            exclude_credentials: exclude_credentials
                .iter()
                .map(|id| PublicKeyCredentialDescriptor::new(id, &Transport::ALL))
                .collect(),
        };

        Ok((options, state))
    }

    /// Build request options for authenticating with existing credentials
    ///
    /// An empty `allow_credentials` lets the authenticator pick a
    /// discoverable credential.
    ///
    /// # Errors
    /// Returns `CryptoStrong` if no challenge can be generated
    pub fn get_options(
        &self,
        allow_credentials: &[Vec<u8>],
        transports: &[Transport],
        user_verification: UserVerification,
    ) -> Result<(AuthenticationOptions, ChallengeState)> {
        let state = self.new_challenge()?;

        let options = AuthenticationOptions {
            challenge: state.challenge.clone(),
            timeout: self.settings.timeout_ms(),
            rp_id: self.settings.rp_id.clone(),
            allow_credentials: allow_credentials
                .iter()
                .map(|id| PublicKeyCredentialDescriptor::new(id, transports))
                .collect(),
            user_verification,
        };

        Ok((options, state))
    }

    fn new_challenge(&self) -> Result<ChallengeState> {
        let challenge = crypto::generate_challenge(self.settings.challenge_length)?;
        Ok(ChallengeState::new(&challenge, self.settings.timeout_seconds))
    }

    /// Verify a registration response
    ///
    /// `challenge` is the raw challenge issued with the creation options.
    ///
    /// # Errors
    /// Returns the error of the first check that fails, in ceremony order
    pub fn process_create(
        &self,
        client_data_json: &[u8],
        attestation_object: &[u8],
        challenge: &[u8],
    ) -> Result<RegistrationResult> {
        self.verify_registration(client_data_json, attestation_object, challenge)
            .inspect_err(|e| log::debug!("Registration rejected: {e}"))
    }

    fn verify_registration(
        &self,
        client_data_json: &[u8],
        attestation_object: &[u8],
        challenge: &[u8],
    ) -> Result<RegistrationResult> {
        let client_data_hash = crypto::sha256(client_data_json);
        self.check_client_data(client_data_json, CeremonyType::Create, challenge)?;

        let attestation = AttestationObject::parse(attestation_object, &self.formats)?;

        if !attestation.validate_rp_id_hash(&self.rp_id_hash) {
            return Err(WebAuthnError::InvalidRelyingParty(
                "Invalid RP ID hash".to_string(),
            ));
        }

        if !attestation.validate_attestation(&client_data_hash) {
            return Err(WebAuthnError::InvalidSignature(format!(
                "Invalid {} attestation signature",
                attestation.format()
            )));
        }

        if self.settings.require_cts_profile_match && attestation.cts_profile_match() == Some(false) {
            return Err(WebAuthnError::AndroidNotTrusted(
                "SafetyNet ctsProfileMatch is false".to_string(),
            ));
        }

        let root_valid = if self.root_certificates.is_empty() {
            None
        } else {
            let valid = attestation.validate_root_certificate(&self.root_certificates);
            if !valid && self.settings.fail_if_root_mismatch {
                return Err(WebAuthnError::CertificateNotTrusted(
                    "Attestation certificate does not chain to a trusted root".to_string(),
                ));
            }
            Some(valid)
        };

        let auth_data = attestation.authenticator_data();
        self.check_user_flags(auth_data)?;

        let result = RegistrationResult {
            rp_id: self.settings.rp_id.clone(),
            attestation_format: attestation.format(),
            credential_id: ByteBuffer::to_base64url(auth_data.credential_id()?),
            credential_public_key: auth_data.public_key_pem()?,
            certificate_chain: attestation.certificate_chain(),
            certificate: attestation.certificate_pem(),
            certificate_issuer: attestation.certificate_issuer(),
            certificate_subject: attestation.certificate_subject(),
            signature_counter: auth_data.sign_count(),
            aaguid: auth_data.aaguid_uuid()?,
            root_valid,
            user_present: auth_data.user_present(),
            user_verified: auth_data.user_verified(),
            is_backup_eligible: auth_data.is_backup_eligible(),
            is_backup: auth_data.is_backup(),
        };

        log::debug!(
            "Registered {} credential {} ({})",
            result.attestation_format,
            result.credential_id,
            result.aaguid
        );
        Ok(result)
    }

    /// Verify an authentication response
    ///
    /// `credential_public_key` is the PEM stored at registration and
    /// `previous_sign_count` the counter stored after the last ceremony.
    ///
    /// # Errors
    /// Returns the error of the first check that fails, in ceremony order
    pub fn process_get(
        &self,
        client_data_json: &[u8],
        authenticator_data: &[u8],
        signature: &[u8],
        credential_public_key: &str,
        challenge: &[u8],
        previous_sign_count: u32,
    ) -> Result<AssertionResult> {
        self.verify_assertion(
            client_data_json,
            authenticator_data,
            signature,
            credential_public_key,
            challenge,
            previous_sign_count,
        )
        .inspect_err(|e| log::debug!("Authentication rejected: {e}"))
    }

    fn verify_assertion(
        &self,
        client_data_json: &[u8],
        authenticator_data: &[u8],
        signature: &[u8],
        credential_public_key: &str,
        challenge: &[u8],
        previous_sign_count: u32,
    ) -> Result<AssertionResult> {
        let auth_data = AuthenticatorData::parse(authenticator_data)?;
        let client_data_hash = crypto::sha256(client_data_json);
        self.check_client_data(client_data_json, CeremonyType::Get, challenge)?;

        if auth_data.rp_id_hash() != &self.rp_id_hash {
            return Err(WebAuthnError::InvalidRelyingParty(
                "Invalid RP ID hash".to_string(),
            ));
        }

        self.check_user_flags(&auth_data)?;

        let signed_data = [authenticator_data, client_data_hash.as_slice()].concat();
        crypto::verify_pem(credential_public_key, &signed_data, signature)?;

        let sign_count = auth_data.sign_count();
        if (previous_sign_count != 0 || sign_count != 0) && previous_sign_count >= sign_count {
            return Err(WebAuthnError::SignatureCounter(format!(
                "Signature counter not increased ({previous_sign_count} -> {sign_count})"
            )));
        }

        Ok(AssertionResult {
            signature_counter: sign_count,
            user_present: auth_data.user_present(),
            user_verified: auth_data.user_verified(),
            is_backup_eligible: auth_data.is_backup_eligible(),
            is_backup: auth_data.is_backup(),
        })
    }

    fn check_client_data(
        &self,
        client_data_json: &[u8],
        ceremony: CeremonyType,
        challenge: &[u8],
    ) -> Result<()> {
        let client_data = ClientData::parse(client_data_json)?;
        client_data.check_type(ceremony)?;
        client_data.check_challenge(challenge)?;
        self.origin_policy.check(client_data.origin())
    }

    fn check_user_flags(&self, auth_data: &AuthenticatorData) -> Result<()> {
        if self.settings.require_user_presence && !auth_data.user_present() {
            return Err(WebAuthnError::UserPresent(
                "User presence flag not set".to_string(),
            ));
        }
        if self.settings.require_user_verification && !auth_data.user_verified() {
            return Err(WebAuthnError::UserVerificated(
                "User verification flag not set".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::certificates::CertificateBuilder;
    use crate::testing::constants::{ORIGIN, RP_ID, RP_NAME};
    use crate::testing::{fixtures, DistinguishedName};
    use crate::types::ResidentKey;

    fn settings() -> WebAuthnSettings {
        WebAuthnSettings::for_rp(RP_ID, RP_NAME)
    }

    fn service() -> WebAuthn {
        WebAuthn::new(settings()).unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_settings() {
        let empty_rp = WebAuthnSettings::for_rp("  ", RP_NAME);
        assert!(matches!(
            WebAuthn::new(empty_rp),
            Err(WebAuthnError::InvalidData(_))
        ));

        let unknown_format = WebAuthnSettings {
            allowed_formats: vec!["u2f".to_string()],
            ..settings()
        };
        assert!(matches!(
            WebAuthn::new(unknown_format),
            Err(WebAuthnError::InvalidData(_))
        ));

        let no_formats = WebAuthnSettings {
            allowed_formats: Vec::new(),
            ..settings()
        };
        assert!(WebAuthn::new(no_formats).is_err());

        let missing_roots = WebAuthnSettings {
            root_certificate_paths: vec!["/nonexistent/roots.pem".into()],
            ..settings()
        };
        assert!(matches!(
            WebAuthn::new(missing_roots),
            Err(WebAuthnError::InvalidData(_))
        ));
    }

    #[test]
    fn test_rp_id_hash_precomputed() {
        assert_eq!(service().rp_id_hash(), &fixtures::rp_id_hash(RP_ID));
    }

    #[test]
    fn test_attestation_conveyance() {
        assert_eq!(
            service().attestation_conveyance(),
            AttestationConveyance::Indirect
        );

        let none_only = WebAuthn::new(WebAuthnSettings {
            allowed_formats: vec!["none".to_string()],
            ..settings()
        })
        .unwrap();
        assert_eq!(
            none_only.attestation_conveyance(),
            AttestationConveyance::None
        );

        let signer = fixtures::p256_signing_key(3);
        let root = CertificateBuilder::new(DistinguishedName::new("Root CA"))
            .ca()
            .sign(&signer);
        let mut roots = RootCertificates::new();
        roots.add_der(root).unwrap();
        assert_eq!(
            service().with_root_certificates(roots).attestation_conveyance(),
            AttestationConveyance::Direct
        );
    }

    #[test]
    fn test_create_options() {
        let user = UserEntity::new(b"user-1", "alice@example.com", "Alice");
        let selection = AuthenticatorSelectionCriteria::new(
            UserVerification::Required,
            ResidentKey::Preferred,
            None,
        );

        let (options, state) = service()
            .create_options(user, selection, &[b"old-credential".to_vec()])
            .unwrap();

        assert_eq!(options.challenge, state.challenge);
        assert_eq!(state.challenge_bytes().unwrap().len(), 32);
        assert_eq!(options.rp.id, RP_ID);
        assert_eq!(options.timeout, 20_000);
        assert_eq!(
            options
                .pub_key_cred_params
                .iter()
                .map(|param| param.alg)
                .collect::<Vec<_>>(),
            vec![-8, -7, -257]
        );
        assert_eq!(options.exclude_credentials.len(), 1);
        assert_eq!(options.exclude_credentials[0].transports, Transport::ALL.to_vec());

        let json = serde_json::to_value(&options).unwrap();
        assert_eq!(json["attestation"], "indirect");
        assert_eq!(json["authenticatorSelection"]["userVerification"], "required");
        assert_eq!(json["pubKeyCredParams"][0]["type"], "public-key");
        assert_eq!(json["user"]["id"], "dXNlci0x");
    }

    #[test]
    fn test_get_options() {
        let service = WebAuthn::new(WebAuthnSettings {
            challenge_length: 16,
            timeout_seconds: 60,
            ..settings()
        })
        .unwrap();

        let (options, state) = service
            .get_options(
                &[b"cred-a".to_vec(), b"cred-b".to_vec()],
                &[Transport::Internal],
                UserVerification::Discouraged,
            )
            .unwrap();

        assert_eq!(state.challenge_bytes().unwrap().len(), 16);
        assert_eq!(options.timeout, 60_000);
        assert_eq!(options.allow_credentials.len(), 2);
        assert!(options
            .allow_credentials
            .iter()
            .all(|cred| cred.transports == vec![Transport::Internal]));

        let json = serde_json::to_value(&options).unwrap();
        assert_eq!(json["rpId"], RP_ID);
        assert_eq!(json["userVerification"], "discouraged");
        assert_eq!(json["allowCredentials"][0]["id"], "Y3JlZC1h");

        let (_, other) = service
            .get_options(&[], &[], UserVerification::Preferred)
            .unwrap();
        assert_ne!(state.challenge, other.challenge);
    }

    #[test]
    fn test_wrong_ceremony_type_rejected() {
        let client_data = fixtures::client_data_json("webauthn.get", &[0; 32], ORIGIN);
        assert!(matches!(
            service().process_create(&client_data, &[0xa0], &[0; 32]),
            Err(WebAuthnError::InvalidType(_))
        ));
    }
}
