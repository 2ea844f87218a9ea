use base64::{engine::general_purpose::STANDARD, Engine};
use log::debug;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::auth::TokenSource;
use crate::secrets::{secret_version_name, SecretAccessError, SecretStore};

#[derive(Debug, Deserialize)]
struct AccessResponse {
    payload: Payload,
}

#[derive(Debug, Deserialize)]
struct Payload {
    #[serde(default)]
    data: String,
}

/// Decode the base64 payload of an access response into text.
fn decode_payload(name: &str, body: &str) -> Result<String, SecretAccessError> {
    let response: AccessResponse = serde_json::from_str(body)
        .map_err(|e| SecretAccessError::InvalidPayload(name.to_string(), e.to_string()))?;

    let bytes = STANDARD
        .decode(response.payload.data.as_bytes())
        .map_err(|e| SecretAccessError::InvalidPayload(name.to_string(), e.to_string()))?;

    String::from_utf8(bytes).map_err(|e| SecretAccessError::InvalidPayload(name.to_string(), e.to_string()))
}

/// Blocking client for the managed secret store.
pub struct SecretManagerClient {
    client: Client,
    base_url: String,
    tokens: Box<dyn TokenSource>,
}

impl SecretManagerClient {
    pub fn new(client: Client, base_url: impl Into<String>, tokens: Box<dyn TokenSource>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }
}

impl SecretStore for SecretManagerClient {
    fn access(&self, project_id: &str, secret_id: &str, version: &str) -> Result<String, SecretAccessError> {
        let name = secret_version_name(project_id, secret_id, version);
        let token = self
            .tokens
            .access_token()
            .map_err(|e| SecretAccessError::Unavailable(e.to_string()))?;

        debug!("Accessing secret {}", name);
        let response = self
            .client
            .get(format!("{}/{}:access", self.base_url, name))
            .bearer_auth(token)
            .send()
            .map_err(|e| SecretAccessError::Unavailable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| SecretAccessError::Unavailable(e.to_string()))?;

        match status {
            StatusCode::OK => decode_payload(&name, &body),
            StatusCode::NOT_FOUND => Err(SecretAccessError::NotFound(name)),
            StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => Err(SecretAccessError::PermissionDenied(name)),
            other => Err(SecretAccessError::Unavailable(format!("{} returned {}", name, other))),
        }
    }
}
