use reqwest::blocking::Client;

use crate::error::{RelayError, Result};

/// Create the blocking HTTP client shared by the token, warehouse, secret and
/// relay calls of one invocation.
///
/// No request timeout is set beyond the library defaults.
pub fn create_http_client() -> Result<Client> {
    Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| RelayError::Configuration(format!("Failed to create HTTP client: {}", e)))
}
