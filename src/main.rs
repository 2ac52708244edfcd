#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![deny(warnings)]
#![allow(clippy::multiple_crate_versions)]

use std::path::Path;
use std::process::ExitCode;

use anyhow::{bail, Context};
use passkey_core::buffer::ByteBuffer;
use passkey_core::{WebAuthn, WebAuthnError, WebAuthnSettings};
use serde::Deserialize;

/// Registration response fields, base64url encoded
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct CreateRequest {
    #[serde(rename = "clientDataJSON")]
    client_data_json: String,
    attestation_object: String,
    challenge: String,
}

/// Authentication response fields, base64url encoded except the PEM key
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GetRequest {
    #[serde(rename = "clientDataJSON")]
    client_data_json: String,
    authenticator_data: String,
    signature: String,
    public_key: String,
    challenge: String,
    #[serde(default)]
    sign_count: u32,
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let (command, file) = match args.as_slice() {
        [_, command, file] => (command.as_str(), file.as_str()),
        _ => {
            eprintln!("Usage: passkey-core <create|get> <request.json>");
            return ExitCode::from(2);
        }
    };

    match run(command, Path::new(file)) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            match e.downcast_ref::<WebAuthnError>() {
                Some(err) => eprintln!("{} (code {}): {}", err.public_message(), err.code(), err),
                None => eprintln!("Error: {e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(command: &str, file: &Path) -> anyhow::Result<String> {
    // Load configuration from WebAuthn.toml and environment variables
    // This also initializes the logger
    let settings = WebAuthnSettings::load().context("Failed to load settings")?;
    let webauthn = WebAuthn::new(settings)?;

    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let output = match command {
        "create" => {
            let request: CreateRequest =
                serde_json::from_str(&content).context("Invalid create request")?;
            let result = webauthn.process_create(
                &ByteBuffer::from_base64url(&request.client_data_json)?,
                &ByteBuffer::from_base64url(&request.attestation_object)?,
                &ByteBuffer::from_base64url(&request.challenge)?,
            )?;
            serde_json::to_string_pretty(&result)?
        }
        "get" => {
            let request: GetRequest =
                serde_json::from_str(&content).context("Invalid get request")?;
            let result = webauthn.process_get(
                &ByteBuffer::from_base64url(&request.client_data_json)?,
                &ByteBuffer::from_base64url(&request.authenticator_data)?,
                &ByteBuffer::from_base64url(&request.signature)?,
                &request.public_key,
                &ByteBuffer::from_base64url(&request.challenge)?,
                request.sign_count,
            )?;
            serde_json::to_string_pretty(&result)?
        }
        other => bail!("Unknown command: {other}"),
    };

    Ok(output)
}
