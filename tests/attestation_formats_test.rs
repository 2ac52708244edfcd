use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::SigningKey;
use serde_json::json;

use passkey_core::certificate::Certificate;
use passkey_core::crypto;
use passkey_core::testing::builders::{cbor_bytes, cbor_int, cbor_text, cbor_x5c};
use passkey_core::testing::certificates::{
    android_key_description, apple_nonce_extension, OID_ANDROID_KEY_DESCRIPTION, OID_APPLE_NONCE,
};
use passkey_core::testing::constants::{AAGUID, CREDENTIAL_ID, ORIGIN, RP_ID, RP_NAME};
use passkey_core::testing::{
    fixtures, AttestationObjectBuilder, AuthDataBuilder, CertificateBuilder, DistinguishedName,
};
use passkey_core::{AttestationFormat, RootCertificates, WebAuthn, WebAuthnError, WebAuthnSettings};

const CHALLENGE: [u8; 32] = [0x42; 32];

fn settings() -> WebAuthnSettings {
    WebAuthnSettings::for_rp(RP_ID, RP_NAME)
}

fn service() -> WebAuthn {
    WebAuthn::new(settings()).unwrap()
}

fn credential_key() -> SigningKey {
    fixtures::es256_signing_key()
}

fn auth_data() -> Vec<u8> {
    AuthDataBuilder::new(RP_ID)
        .attested_credential(AAGUID, CREDENTIAL_ID, &fixtures::es256_cose_key(&credential_key()))
        .build()
}

fn client_data() -> Vec<u8> {
    fixtures::client_data_json("webauthn.create", &CHALLENGE, ORIGIN)
}

fn client_data_hash() -> [u8; 32] {
    crypto::sha256(&client_data())
}

/// `authData || clientDataHash`
fn signed_data(auth_data: &[u8]) -> Vec<u8> {
    fixtures::signed_data(auth_data, &client_data())
}

fn spki(key: &SigningKey) -> Vec<u8> {
    fixtures::es256_key(key).to_der()
}

fn register(service: &WebAuthn, attestation: &[u8]) -> passkey_core::error::Result<passkey_core::RegistrationResult> {
    service.process_create(&client_data(), attestation, &CHALLENGE)
}

struct Pki {
    root_key: SigningKey,
    root_name: DistinguishedName,
    root: Vec<u8>,
}

impl Pki {
    fn new(seed: u8, name: &str) -> Self {
        let root_key = fixtures::p256_signing_key(seed);
        let root_name = DistinguishedName::new(name).organization("Example Vendor");
        let root = CertificateBuilder::new(root_name.clone())
            .ca()
            .sign(&root_key);
        Self {
            root_key,
            root_name,
            root,
        }
    }

    fn roots(&self) -> RootCertificates {
        let mut roots = RootCertificates::new();
        roots.add_der(self.root.clone()).unwrap();
        roots
    }

    fn leaf(&self, key: &SigningKey) -> CertificateBuilder {
        CertificateBuilder::new(
            DistinguishedName::new("Packed Attestation")
                .organization("Example Vendor")
                .organizational_unit("Authenticator Attestation"),
        )
        .issued_by(self.root_name.clone())
        .public_key(&spki(key))
        .serial(2)
    }
}

fn packed_full(leaf: &[u8], attestation_key: &SigningKey, intermediates: &[Vec<u8>]) -> Vec<u8> {
    let data = auth_data();
    let sig = fixtures::sign_es256(attestation_key, &signed_data(&data));
    let mut x5c = vec![leaf.to_vec()];
    x5c.extend_from_slice(intermediates);

    AttestationObjectBuilder::new("packed", &data)
        .statement("alg", cbor_int(-7))
        .statement("sig", cbor_bytes(&sig))
        .statement("x5c", cbor_x5c(&x5c))
        .build()
}

#[test]
fn test_packed_self_attestation() {
    let data = auth_data();
    let sig = fixtures::sign_es256(&credential_key(), &signed_data(&data));
    let attestation = AttestationObjectBuilder::new("packed", &data)
        .statement("alg", cbor_int(-7))
        .statement("sig", cbor_bytes(&sig))
        .build();

    let result = register(&service(), &attestation).unwrap();
    assert_eq!(result.attestation_format, AttestationFormat::Packed);
    assert!(result.certificate.is_none());
    assert!(result.root_valid.is_none());

    // alg must describe the credential key
    let mismatched = AttestationObjectBuilder::new("packed", &data)
        .statement("alg", cbor_int(-8))
        .statement("sig", cbor_bytes(&sig))
        .build();
    assert!(matches!(
        register(&service(), &mismatched),
        Err(WebAuthnError::InvalidSignature(_))
    ));
}

#[test]
fn test_packed_self_attestation_rejects_foreign_signature() {
    let data = auth_data();
    let sig = fixtures::sign_es256(&fixtures::p256_signing_key(21), &signed_data(&data));
    let attestation = AttestationObjectBuilder::new("packed", &data)
        .statement("alg", cbor_int(-7))
        .statement("sig", cbor_bytes(&sig))
        .build();

    assert!(matches!(
        register(&service(), &attestation),
        Err(WebAuthnError::InvalidSignature(_))
    ));
}

#[test]
fn test_packed_full_attestation_metadata() {
    let pki = Pki::new(11, "Example Root CA");
    let attestation_key = fixtures::p256_signing_key(12);
    let leaf = pki.leaf(&attestation_key).sign(&pki.root_key);

    let result = register(&service(), &packed_full(&leaf, &attestation_key, &[])).unwrap();

    let certificate = result.certificate.unwrap();
    assert!(certificate.starts_with("-----BEGIN CERTIFICATE-----\n"));
    assert_eq!(certificate, Certificate::from_der(leaf).unwrap().to_pem());
    assert_eq!(result.certificate_issuer.as_deref(), Some("Example Root CA (Example Vendor)"));
    assert_eq!(
        result.certificate_subject.as_deref(),
        Some("Packed Attestation (Example Vendor Authenticator Attestation)")
    );
    assert!(result.certificate_chain.is_none());
    assert!(result.root_valid.is_none());
}

#[test]
fn test_packed_full_attestation_root_validation() {
    let pki = Pki::new(11, "Example Root CA");
    let attestation_key = fixtures::p256_signing_key(12);
    let leaf = pki.leaf(&attestation_key).sign(&pki.root_key);
    let attestation = packed_full(&leaf, &attestation_key, &[]);

    let trusted = service().with_root_certificates(pki.roots());
    assert_eq!(register(&trusted, &attestation).unwrap().root_valid, Some(true));

    let other = Pki::new(31, "Other Root CA");
    let untrusted = service().with_root_certificates(other.roots());
    assert!(matches!(
        register(&untrusted, &attestation),
        Err(WebAuthnError::CertificateNotTrusted(_))
    ));

    let lenient = WebAuthn::new(WebAuthnSettings {
        fail_if_root_mismatch: false,
        ..settings()
    })
    .unwrap()
    .with_root_certificates(other.roots());
    assert_eq!(register(&lenient, &attestation).unwrap().root_valid, Some(false));
}

#[test]
fn test_root_validation_through_intermediate() {
    let pki = Pki::new(11, "Example Root CA");
    let intermediate_key = fixtures::p256_signing_key(13);
    let intermediate_name = DistinguishedName::new("Example Intermediate CA");
    let intermediate = CertificateBuilder::new(intermediate_name.clone())
        .issued_by(pki.root_name.clone())
        .public_key(&spki(&intermediate_key))
        .ca()
        .serial(3)
        .sign(&pki.root_key);

    let attestation_key = fixtures::p256_signing_key(14);
    let leaf = pki
        .leaf(&attestation_key)
        .issued_by(intermediate_name)
        .sign(&intermediate_key);

    let attestation = packed_full(&leaf, &attestation_key, &[intermediate.clone(), pki.root.clone()]);
    let result = register(&service().with_root_certificates(pki.roots()), &attestation).unwrap();

    assert_eq!(result.root_valid, Some(true));
    // the self-signed root is left out of the chain
    assert_eq!(
        result.certificate_chain.as_deref(),
        Some(Certificate::from_der(intermediate).unwrap().to_pem().as_str())
    );

    // without the intermediate the leaf cannot reach the root
    let broken = packed_full(&leaf, &attestation_key, &[]);
    assert!(matches!(
        register(&service().with_root_certificates(pki.roots()), &broken),
        Err(WebAuthnError::CertificateNotTrusted(_))
    ));
}

#[test]
fn test_expired_certificate_not_trusted() {
    let pki = Pki::new(11, "Example Root CA");
    let attestation_key = fixtures::p256_signing_key(12);
    let leaf = pki.leaf(&attestation_key).expired().sign(&pki.root_key);

    let result = register(
        &service().with_root_certificates(pki.roots()),
        &packed_full(&leaf, &attestation_key, &[]),
    );
    assert!(matches!(result, Err(WebAuthnError::CertificateNotTrusted(_))));
}

#[test]
fn test_root_certificates_loaded_from_settings() {
    let pki = Pki::new(11, "Example Root CA");
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("root.pem"),
        Certificate::from_der(pki.root.clone()).unwrap().to_pem(),
    )
    .unwrap();
    std::fs::write(dir.path().join("notes.txt"), "not a certificate").unwrap();

    let service = WebAuthn::new(WebAuthnSettings {
        root_certificate_paths: vec![dir.path().to_path_buf()],
        ..settings()
    })
    .unwrap();

    let attestation_key = fixtures::p256_signing_key(12);
    let leaf = pki.leaf(&attestation_key).sign(&pki.root_key);
    let result = register(&service, &packed_full(&leaf, &attestation_key, &[])).unwrap();
    assert_eq!(result.root_valid, Some(true));

    // none attestation has no certificate to validate
    let none = AttestationObjectBuilder::new("none", &auth_data()).build();
    assert!(matches!(
        register(&service, &none),
        Err(WebAuthnError::CertificateNotTrusted(_))
    ));
}

#[test]
fn test_fido_u2f_attestation() {
    let attestation_key = fixtures::p256_signing_key(15);
    let cert = CertificateBuilder::new(DistinguishedName::new("U2F Device")).sign(&attestation_key);

    let data = auth_data();
    let mut message = vec![0x00];
    message.extend_from_slice(&fixtures::rp_id_hash(RP_ID));
    message.extend_from_slice(&client_data_hash());
    message.extend_from_slice(CREDENTIAL_ID);
    message.extend_from_slice(&fixtures::es256_key(&credential_key()).u2f_public_key().unwrap());
    let sig = fixtures::sign_es256(&attestation_key, &message);

    let attestation = AttestationObjectBuilder::new("fido-u2f", &data)
        .statement("sig", cbor_bytes(&sig))
        .statement("x5c", cbor_x5c(&[cert.clone()]))
        .build();
    let result = register(&service(), &attestation).unwrap();
    assert_eq!(result.attestation_format, AttestationFormat::FidoU2f);
    assert_eq!(result.certificate_subject.as_deref(), Some("U2F Device"));

    let two_certs = AttestationObjectBuilder::new("fido-u2f", &data)
        .statement("sig", cbor_bytes(&sig))
        .statement("x5c", cbor_x5c(&[cert.clone(), cert.clone()]))
        .build();
    assert!(matches!(
        register(&service(), &two_certs),
        Err(WebAuthnError::InvalidData(_))
    ));

    let rsa_alg = AttestationObjectBuilder::new("fido-u2f", &data)
        .statement("alg", cbor_int(-257))
        .statement("sig", cbor_bytes(&sig))
        .statement("x5c", cbor_x5c(&[cert]))
        .build();
    assert!(matches!(
        register(&service(), &rsa_alg),
        Err(WebAuthnError::InvalidData(_))
    ));
}

#[test]
fn test_android_key_attestation() {
    let data = auth_data();
    let sig = fixtures::sign_es256(&credential_key(), &signed_data(&data));

    let build = |challenge: &[u8]| {
        let cert = CertificateBuilder::new(DistinguishedName::new("Android Keystore Key"))
            .extension(OID_ANDROID_KEY_DESCRIPTION, &android_key_description(challenge))
            .sign(&credential_key());
        AttestationObjectBuilder::new("android-key", &data)
            .statement("alg", cbor_int(-7))
            .statement("sig", cbor_bytes(&sig))
            .statement("x5c", cbor_x5c(&[cert]))
            .build()
    };

    let result = register(&service(), &build(&client_data_hash())).unwrap();
    assert_eq!(result.attestation_format, AttestationFormat::AndroidKey);

    assert!(matches!(
        register(&service(), &build(&[0u8; 32])),
        Err(WebAuthnError::InvalidSignature(_))
    ));
}

#[test]
fn test_android_key_requires_credential_key_certificate() {
    let data = auth_data();
    let other_key = fixtures::p256_signing_key(16);
    let cert = CertificateBuilder::new(DistinguishedName::new("Android Keystore Key"))
        .extension(
            OID_ANDROID_KEY_DESCRIPTION,
            &android_key_description(&client_data_hash()),
        )
        .sign(&other_key);
    let attestation = AttestationObjectBuilder::new("android-key", &data)
        .statement("alg", cbor_int(-7))
        .statement("sig", cbor_bytes(&fixtures::sign_es256(&other_key, &signed_data(&data))))
        .statement("x5c", cbor_x5c(&[cert]))
        .build();

    assert!(matches!(
        register(&service(), &attestation),
        Err(WebAuthnError::InvalidSignature(_))
    ));
}

#[test]
fn test_apple_attestation() {
    let data = auth_data();
    let nonce = crypto::sha256(&signed_data(&data));

    let cert = CertificateBuilder::new(DistinguishedName::new("Apple Anonymous Attestation"))
        .extension(OID_APPLE_NONCE, &apple_nonce_extension(&nonce))
        .sign(&credential_key());
    let attestation = AttestationObjectBuilder::new("apple", &data)
        .statement("x5c", cbor_x5c(&[cert]))
        .build();
    let result = register(&service(), &attestation).unwrap();
    assert_eq!(result.attestation_format, AttestationFormat::Apple);

    let stale = CertificateBuilder::new(DistinguishedName::new("Apple Anonymous Attestation"))
        .extension(OID_APPLE_NONCE, &apple_nonce_extension(&[0; 32]))
        .sign(&credential_key());
    let attestation = AttestationObjectBuilder::new("apple", &data)
        .statement("x5c", cbor_x5c(&[stale]))
        .build();
    assert!(matches!(
        register(&service(), &attestation),
        Err(WebAuthnError::InvalidSignature(_))
    ));

    let missing = AttestationObjectBuilder::new("apple", &data).build();
    assert!(matches!(
        register(&service(), &missing),
        Err(WebAuthnError::InvalidData(_))
    ));
}

fn tpm_cert_info(extra_data: &[u8]) -> Vec<u8> {
    let mut info = vec![0xff, 0x54, 0x43, 0x47, 0x80, 0x17];
    info.extend_from_slice(&[0x00, 0x04, 0x00, 0x0b, 0xaa, 0xbb]);
    info.extend_from_slice(&u16::try_from(extra_data.len()).unwrap().to_be_bytes());
    info.extend_from_slice(extra_data);
    // clockInfo, firmwareVersion and attested name follow
    info.extend_from_slice(&[0u8; 25]);
    info
}

fn tpm_attestation(cert_info: &[u8], aik: &SigningKey, ver: &str) -> Vec<u8> {
    let cert = CertificateBuilder::new(DistinguishedName::default().organization("TPM Vendor"))
        .sign(aik);
    AttestationObjectBuilder::new("tpm", &auth_data())
        .statement("ver", cbor_text(ver))
        .statement("alg", cbor_int(-7))
        .statement("x5c", cbor_x5c(&[cert]))
        .statement("sig", cbor_bytes(&fixtures::sign_es256(aik, cert_info)))
        .statement("certInfo", cbor_bytes(cert_info))
        .statement("pubArea", cbor_bytes(&[0x00, 0x23, 0x00, 0x0b]))
        .build()
}

#[test]
fn test_tpm_attestation() {
    let aik = fixtures::p256_signing_key(17);
    let extra_data = crypto::sha256(&signed_data(&auth_data()));

    let result = register(&service(), &tpm_attestation(&tpm_cert_info(&extra_data), &aik, "2.0")).unwrap();
    assert_eq!(result.attestation_format, AttestationFormat::Tpm);
    assert_eq!(result.certificate_subject.as_deref(), Some("TPM Vendor"));

    assert!(matches!(
        register(&service(), &tpm_attestation(&tpm_cert_info(&[0; 32]), &aik, "2.0")),
        Err(WebAuthnError::InvalidSignature(_))
    ));
    assert!(matches!(
        register(&service(), &tpm_attestation(&tpm_cert_info(&extra_data), &aik, "1.2")),
        Err(WebAuthnError::InvalidData(_))
    ));
}

fn safetynet_attestation(common_name: &str, cts_profile_match: bool, basic_integrity: bool) -> Vec<u8> {
    let data = auth_data();
    let key = fixtures::p256_signing_key(18);
    let cert = CertificateBuilder::new(DistinguishedName::new(common_name)).sign(&key);

    let header = json!({"alg": "ES256", "x5c": [STANDARD.encode(&cert)]});
    let payload = json!({
        "nonce": STANDARD.encode(crypto::sha256(&signed_data(&data))),
        "timestampMs": 1_760_000_000_000_i64,
        "apkPackageName": "com.google.android.gms",
        "ctsProfileMatch": cts_profile_match,
        "basicIntegrity": basic_integrity,
    });
    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(payload.to_string())
    );
    let signature: p256::ecdsa::Signature = key.sign(signing_input.as_bytes());
    let jws = format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature.to_bytes()));

    AttestationObjectBuilder::new("android-safetynet", &data)
        .statement("ver", cbor_text("242714037"))
        .statement("response", cbor_bytes(jws.as_bytes()))
        .build()
}

#[test]
fn test_android_safetynet_attestation() {
    let result = register(&service(), &safetynet_attestation("attest.android.com", true, true)).unwrap();
    assert_eq!(result.attestation_format, AttestationFormat::AndroidSafetyNet);
    assert_eq!(result.certificate_subject.as_deref(), Some("attest.android.com"));
}

#[test]
fn test_android_safetynet_cts_profile() {
    let attestation = safetynet_attestation("attest.android.com", false, true);
    assert!(matches!(
        register(&service(), &attestation),
        Err(WebAuthnError::AndroidNotTrusted(_))
    ));

    let relaxed = WebAuthn::new(WebAuthnSettings {
        require_cts_profile_match: false,
        ..settings()
    })
    .unwrap();
    assert!(register(&relaxed, &attestation).is_ok());
}

#[test]
fn test_android_safetynet_rejections() {
    assert!(matches!(
        register(&service(), &safetynet_attestation("attest.example.com", true, true)),
        Err(WebAuthnError::InvalidSignature(_))
    ));
    assert!(matches!(
        register(&service(), &safetynet_attestation("attest.android.com", true, false)),
        Err(WebAuthnError::InvalidSignature(_))
    ));

    let malformed = AttestationObjectBuilder::new("android-safetynet", &auth_data())
        .statement("ver", cbor_text("1"))
        .statement("response", cbor_bytes(b"only.two"))
        .build();
    assert!(matches!(
        register(&service(), &malformed),
        Err(WebAuthnError::InvalidData(_))
    ));
}
