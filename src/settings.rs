use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::attestation::AttestationFormat;
use crate::error::WebAuthnError;

/// Name of the settings file looked up in the working and config directories
pub const SETTINGS_FILE: &str = "WebAuthn.toml";

/// Environment variable naming an extra directory holding [`SETTINGS_FILE`]
pub const CONFIG_DIR_ENV: &str = "PASSKEY_CONFIG_DIR";

/// Errors raised while loading settings
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Unable to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML in {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: basic_toml::Error,
    },
}

/// Relying party configuration for the `WebAuthn` engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WebAuthnSettings {
    /// Relying party ID, the registrable domain credentials are scoped to
    pub rp_id: String,
    /// Human readable relying party name shown by authenticators
    pub rp_name: String,
    /// Attestation formats accepted during registration
    pub allowed_formats: Vec<String>,
    /// Root CA certificate files or directories; empty disables CA validation
    pub root_certificate_paths: Vec<PathBuf>,
    /// Allowed `android:apk-key-hash:` origins
    pub android_key_hashes: Vec<String>,
    pub require_user_presence: bool,
    pub require_user_verification: bool,
    /// Reject SafetyNet attestations without `ctsProfileMatch`
    pub require_cts_profile_match: bool,
    /// Reject registrations whose certificate does not chain to a root
    pub fail_if_root_mismatch: bool,
    /// Only accept origin hosts equal to the RP ID or one of its subdomains
    pub require_origin_label_boundary: bool,
    pub timeout_seconds: u64,
    /// Challenge size in bytes
    pub challenge_length: usize,
}

impl Default for WebAuthnSettings {
    fn default() -> Self {
        Self {
            rp_id: "localhost".to_string(),
            rp_name: "Passkey".to_string(),
            allowed_formats: AttestationFormat::ALL
                .iter()
                .map(|format| format.name().to_string())
                .collect(),
            root_certificate_paths: Vec::new(),
            android_key_hashes: Vec::new(),
            require_user_presence: true,
            require_user_verification: false,
            require_cts_profile_match: true,
            fail_if_root_mismatch: true,
            require_origin_label_boundary: false,
            timeout_seconds: 20,
            challenge_length: 32,
        }
    }
}

impl WebAuthnSettings {
    /// Settings for `rp_id` with every other value at its default
    #[must_use]
    pub fn for_rp(rp_id: &str, rp_name: &str) -> Self {
        Self {
            rp_id: rp_id.to_string(),
            rp_name: rp_name.to_string(),
            ..Self::default()
        }
    }

    /// Load settings from configuration files and environment variables
    ///
    /// Settings are layered with the following priority (highest to lowest):
    /// 1. Environment variables
    /// 2. `WebAuthn.toml` in `PASSKEY_CONFIG_DIR` (if set and present)
    /// 3. `WebAuthn.toml` in the current directory (if present)
    /// 4. Defaults
    ///
    /// Also installs `env_logger` unless a logger is already set.
    ///
    /// # Errors
    ///
    /// Returns an error if a settings file exists but cannot be read or parsed
    pub fn load() -> Result<Self, SettingsError> {
        Self::initialize_logging();

        let mut settings = Self::load_base_settings()?;
        settings.apply_env_overrides();

        Ok(settings)
    }

    fn initialize_logging() {
        if env_logger::try_init().is_err() {
            log::trace!("Logger already initialized");
        }
    }

    fn load_base_settings() -> Result<Self, SettingsError> {
        let mut settings = Self::default();

        let local_path = PathBuf::from(SETTINGS_FILE);
        if local_path.exists() {
            settings = Self::from_file(&local_path)?;
            log::info!("Loaded WebAuthn settings from {}", local_path.display());
        }

        if let Ok(config_dir) = std::env::var(CONFIG_DIR_ENV) {
            let config_path = Path::new(&config_dir).join(SETTINGS_FILE);
            if config_path.exists() {
                settings = Self::from_file(&config_path)?;
                log::info!("Overriding WebAuthn settings from {}", config_path.display());
            } else {
                log::info!(
                    "{CONFIG_DIR_ENV} set but no {SETTINGS_FILE} found at: {}",
                    config_path.display()
                );
            }
        }

        Ok(settings)
    }

    /// Parse a TOML settings file; missing keys take their defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        basic_toml::from_str(&content).map_err(|source| SettingsError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `WEBAUTHN_*` environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(rp_id) = std::env::var("WEBAUTHN_RP_ID") {
            self.rp_id = rp_id;
        }
        if let Ok(rp_name) = std::env::var("WEBAUTHN_RP_NAME") {
            self.rp_name = rp_name;
        }
        if let Ok(formats) = std::env::var("WEBAUTHN_ALLOWED_FORMATS") {
            self.allowed_formats = split_list(&formats);
        }
        if let Ok(paths) = std::env::var("WEBAUTHN_ROOT_CERTIFICATES") {
            self.root_certificate_paths = split_list(&paths).into_iter().map(PathBuf::from).collect();
        }
        if let Ok(hashes) = std::env::var("WEBAUTHN_ANDROID_KEY_HASHES") {
            self.android_key_hashes = split_list(&hashes);
        }
        Self::apply_bool_env_override("WEBAUTHN_REQUIRE_UV", &mut self.require_user_verification);
        Self::apply_bool_env_override("WEBAUTHN_REQUIRE_UP", &mut self.require_user_presence);
        if let Ok(value) = std::env::var("WEBAUTHN_TIMEOUT_SECONDS") {
            match value.parse() {
                Ok(timeout) => self.timeout_seconds = timeout,
                Err(_) => log::warn!("Ignoring invalid WEBAUTHN_TIMEOUT_SECONDS: {value}"),
            }
        }
    }

    fn apply_bool_env_override(env_var: &str, target: &mut bool) {
        if let Ok(value) = std::env::var(env_var) {
            match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => *target = true,
                "0" | "false" | "no" => *target = false,
                _ => log::warn!("Ignoring invalid {env_var}: {value}"),
            }
        }
    }

    /// Allowed formats as typed values
    ///
    /// # Errors
    ///
    /// Returns `InvalidData` for an unknown format name
    pub fn attestation_formats(&self) -> Result<Vec<AttestationFormat>, WebAuthnError> {
        self.allowed_formats
            .iter()
            .map(|name| name.parse())
            .collect()
    }

    /// Timeout in milliseconds as sent to the browser
    #[must_use]
    pub fn timeout_ms(&self) -> u64 {
        self.timeout_seconds.saturating_mul(1000)
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToString::to_string)
        .collect()
}
