use chrono::Utc;
use log::debug;
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::auth::service_account::DelegatedCredentials;
use crate::error::{RelayError, Result};
use crate::security::scrub_credentials;

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Anything able to hand out an OAuth2 bearer token.
#[cfg_attr(test, mockall::automock)]
pub trait TokenSource: Send + Sync {
    fn access_token(&self) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

fn parse_token_response(status: reqwest::StatusCode, body: String, source: &str) -> Result<String> {
    if !status.is_success() {
        return Err(RelayError::Credential(format!(
            "{} rejected the token request ({}): {}",
            source,
            status,
            scrub_credentials(&body)
        )));
    }

    let token: TokenResponse = serde_json::from_str(&body)
        .map_err(|e| RelayError::Credential(format!("Unexpected token response from {}: {}", source, e)))?;

    debug!("Obtained access token from {} (expires in {:?}s)", source, token.expires_in);
    Ok(token.access_token)
}

/// Exchanges a signed JWT-bearer assertion for an access token.
pub struct ServiceAccountTokenSource {
    credentials: DelegatedCredentials,
    client: Client,
}

impl ServiceAccountTokenSource {
    pub fn new(credentials: DelegatedCredentials, client: Client) -> Self {
        Self { credentials, client }
    }
}

impl TokenSource for ServiceAccountTokenSource {
    fn access_token(&self) -> Result<String> {
        let assertion = self.credentials.assertion(Utc::now())?;
        let token_uri = self.credentials.token_uri();

        debug!(
            "Requesting token for {} acting as {:?}",
            self.credentials.client_email(),
            self.credentials.subject()
        );

        let response = self
            .client
            .post(token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .map_err(|e| RelayError::Credential(format!("Token request to {} failed: {}", token_uri, e)))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| RelayError::Credential(format!("Failed to read token response: {}", e)))?;

        parse_token_response(status, body, token_uri)
    }
}

/// Token of the identity the process runs as, from the instance metadata server.
pub struct MetadataTokenSource {
    url: String,
    scopes: Vec<String>,
    client: Client,
}

impl MetadataTokenSource {
    pub fn new(url: impl Into<String>, scopes: Vec<String>, client: Client) -> Self {
        Self {
            url: url.into(),
            scopes,
            client,
        }
    }
}

impl TokenSource for MetadataTokenSource {
    fn access_token(&self) -> Result<String> {
        let mut request = self.client.get(&self.url).header("Metadata-Flavor", "Google");
        if !self.scopes.is_empty() {
            request = request.query(&[("scopes", self.scopes.join(","))]);
        }

        let response = request
            .send()
            .map_err(|e| RelayError::Credential(format!("Metadata server unreachable: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| RelayError::Credential(format!("Failed to read metadata response: {}", e)))?;

        parse_token_response(status, body, "metadata server")
    }
}
