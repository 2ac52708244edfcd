//! X.509 attestation certificates and trust anchors

use std::fs;
use std::path::{Path, PathBuf};

use x509_parser::certificate::X509Certificate;
use x509_parser::pem::Pem;
use x509_parser::prelude::FromDer;
use x509_parser::x509::X509Name;

use crate::crypto::PublicKey;
use crate::der;
use crate::error::{Result, WebAuthnError};

const ROOT_CERTIFICATE_EXTENSIONS: [&str; 4] = ["pem", "crt", "cer", "der"];

/// DER encoded X.509 certificate that is known to parse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    der: Vec<u8>,
}

impl Certificate {
    /// # Errors
    /// Returns `InvalidData` if the bytes are not a DER X.509 certificate
    pub fn from_der(der: Vec<u8>) -> Result<Self> {
        parse(&der)?;
        Ok(Self { der })
    }

    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    fn parsed(&self) -> Result<X509Certificate<'_>> {
        parse(&self.der)
    }

    /// PEM `CERTIFICATE` armor
    #[must_use]
    pub fn to_pem(&self) -> String {
        der::pem("CERTIFICATE", &self.der)
    }

    /// DER `SubjectPublicKeyInfo` of the certified key
    ///
    /// # Errors
    /// Returns `InvalidData` if the certificate cannot be parsed
    pub fn public_key_der(&self) -> Result<Vec<u8>> {
        Ok(self.parsed()?.public_key().raw.to_vec())
    }

    /// # Errors
    /// Returns `InvalidPublicKey` if the certified key is not supported
    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_der(&self.public_key_der()?)
    }

    /// Issuer rendered as `CN (O OU)`
    ///
    /// # Errors
    /// Returns `InvalidData` if the certificate cannot be parsed
    pub fn issuer(&self) -> Result<String> {
        Ok(display_name(self.parsed()?.issuer()))
    }

    /// Subject rendered as `CN (O OU)`
    ///
    /// # Errors
    /// Returns `InvalidData` if the certificate cannot be parsed
    pub fn subject(&self) -> Result<String> {
        Ok(display_name(self.parsed()?.subject()))
    }

    /// First subject common name
    #[must_use]
    pub fn common_name(&self) -> Option<String> {
        let cert = self.parsed().ok()?;
        let cn = cert
            .subject()
            .iter_common_name()
            .find_map(|attr| attr.as_str().ok())
            .map(str::to_string);
        cn
    }

    #[must_use]
    pub fn is_self_signed(&self) -> bool {
        self.parsed()
            .is_ok_and(|cert| cert.issuer().as_raw() == cert.subject().as_raw())
    }

    /// Raw value of the extension with dotted `oid`
    #[must_use]
    pub fn extension(&self, oid: &str) -> Option<Vec<u8>> {
        let cert = self.parsed().ok()?;
        let value = cert
            .extensions()
            .iter()
            .find(|ext| ext.oid.to_id_string() == oid)
            .map(|ext| ext.value.to_vec());
        value
    }

    /// Whether `issuer` certified this certificate and both are inside their validity period
    fn is_issued_by(&self, issuer: &Self) -> bool {
        let (Ok(cert), Ok(parent)) = (self.parsed(), issuer.parsed()) else {
            return false;
        };

        cert.issuer().as_raw() == parent.subject().as_raw()
            && cert.validity().is_valid()
            && parent.validity().is_valid()
            && cert.verify_signature(Some(parent.public_key())).is_ok()
    }
}

fn parse(der: &[u8]) -> Result<X509Certificate<'_>> {
    match X509Certificate::from_der(der) {
        Ok((rest, cert)) if rest.is_empty() => Ok(cert),
        Ok(_) => Err(WebAuthnError::invalid_data(
            "Trailing bytes after certificate",
        )),
        Err(e) => Err(WebAuthnError::invalid_data(format!(
            "Invalid certificate: {e}"
        ))),
    }
}

/// `CN (O OU)`, or `O OU` when there is no common name
fn display_name(name: &X509Name<'_>) -> String {
    let cn = name
        .iter_common_name()
        .find_map(|attr| attr.as_str().ok())
        .unwrap_or_default()
        .to_string();
    let org = name
        .iter_organization()
        .find_map(|attr| attr.as_str().ok())
        .unwrap_or_default();
    let unit = name
        .iter_organizational_unit()
        .find_map(|attr| attr.as_str().ok())
        .unwrap_or_default();
    let org_unit = format!("{org} {unit}").trim().to_string();

    match (cn.is_empty(), org_unit.is_empty()) {
        (false, false) => format!("{cn} ({org_unit})"),
        (false, true) => cn,
        (true, _) => org_unit,
    }
}

/// Parse an `x5c` array entry by entry
///
/// # Errors
/// Returns `InvalidData` if any entry is not a certificate
pub fn parse_chain<I>(entries: I) -> Result<Vec<Certificate>>
where
    I: IntoIterator<Item = Vec<u8>>,
{
    entries.into_iter().map(Certificate::from_der).collect()
}

/// PEM bundle of the intermediates in an `x5c` chain, self-signed entries excluded
#[must_use]
pub fn chain_pem(chain: &[Certificate]) -> Option<String> {
    let pem: String = chain
        .iter()
        .skip(1)
        .filter(|cert| !cert.is_self_signed())
        .map(Certificate::to_pem)
        .collect();

    if pem.is_empty() {
        None
    } else {
        Some(pem)
    }
}

/// Trusted root CA certificates for attestation validation
#[derive(Debug, Clone, Default)]
pub struct RootCertificates {
    certs: Vec<Certificate>,
}

impl RootCertificates {
    #[must_use]
    pub const fn new() -> Self {
        Self { certs: Vec::new() }
    }

    /// Load every certificate from the given files and directories
    ///
    /// Directories are scanned without recursion for `.pem`, `.crt`, `.cer`
    /// and `.der` files.
    ///
    /// # Errors
    /// Returns `InvalidData` if a path cannot be read or holds no certificate
    pub fn load<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut roots = Self::new();

        for path in paths {
            let path = path.as_ref();
            if path.is_dir() {
                for file in certificate_files(path)? {
                    roots.add_file(&file)?;
                }
            } else {
                roots.add_file(path)?;
            }
        }

        log::debug!("Loaded {} root certificates", roots.len());
        Ok(roots)
    }

    fn add_file(&mut self, path: &Path) -> Result<()> {
        let data = fs::read(path).map_err(|e| {
            WebAuthnError::invalid_data(format!(
                "Unable to read root certificate {}: {e}",
                path.display()
            ))
        })?;

        let added = self.add_bytes(&data).map_err(|e| {
            WebAuthnError::invalid_data(format!("{}: {}", path.display(), e.message()))
        })?;
        log::trace!("Loaded {added} certificates from {}", path.display());
        Ok(())
    }

    /// Add PEM (one or more certificates) or DER data, returning how many were added
    ///
    /// # Errors
    /// Returns `InvalidData` if nothing in `data` is a certificate
    pub fn add_bytes(&mut self, data: &[u8]) -> Result<usize> {
        if data.starts_with(b"-----") || data.windows(11).any(|w| w == b"-----BEGIN ") {
            let mut added = 0;
            for pem in Pem::iter_from_buffer(data) {
                let pem = pem.map_err(|e| WebAuthnError::invalid_data(format!("Invalid PEM: {e}")))?;
                if pem.label == "CERTIFICATE" {
                    self.certs.push(Certificate::from_der(pem.contents)?);
                    added += 1;
                }
            }
            if added == 0 {
                return Err(WebAuthnError::invalid_data("No certificate in PEM data"));
            }
            Ok(added)
        } else {
            self.add_der(data.to_vec())?;
            Ok(1)
        }
    }

    /// # Errors
    /// Returns `InvalidData` if `der` is not a certificate
    pub fn add_der(&mut self, der: Vec<u8>) -> Result<()> {
        self.certs.push(Certificate::from_der(der)?);
        Ok(())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.certs.len()
    }

    /// Whether the first certificate of `chain` leads to one of the roots
    ///
    /// The walk follows issuer names through the non-self-signed
    /// intermediates of `chain`; every link must verify and be inside its
    /// validity period.
    #[must_use]
    pub fn validate(&self, chain: &[Certificate]) -> bool {
        let Some(leaf) = chain.first() else {
            return false;
        };

        let intermediates: Vec<&Certificate> = chain
            .iter()
            .skip(1)
            .filter(|cert| !cert.is_self_signed())
            .collect();

        let mut current = leaf;
        // each intermediate can be used at most once on a path
        for _ in 0..=intermediates.len() {
            if self.certs.iter().any(|root| current.is_issued_by(root)) {
                return true;
            }

            match intermediates
                .iter()
                .copied()
                .find(|parent| parent.der != current.der && current.is_issued_by(parent))
            {
                Some(parent) => current = parent,
                None => break,
            }
        }

        log::debug!("Attestation certificate does not chain to a trusted root");
        false
    }
}

fn certificate_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| {
        WebAuthnError::invalid_data(format!(
            "Unable to read certificate directory {}: {e}",
            dir.display()
        ))
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| {
                        ROOT_CERTIFICATE_EXTENSIONS
                            .iter()
                            .any(|known| ext.eq_ignore_ascii_case(known))
                    })
        })
        .collect();
    files.sort();
    Ok(files)
}
