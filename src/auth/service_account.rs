use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::constants::{ASSERTION_LIFETIME_SECS, DEFAULT_TOKEN_URI};
use crate::error::{RelayError, Result};

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// A service account key record as issued by the identity provider.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type", default)]
    pub key_type: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub private_key_id: String,
    pub private_key: String,
    pub client_email: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

// Keep the private key out of logs and panic messages.
impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("key_type", &self.key_type)
            .field("project_id", &self.project_id)
            .field("private_key_id", &self.private_key_id)
            .field("private_key", &"<REDACTED>")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

impl ServiceAccountKey {
    /// Decode a base64-wrapped JSON key.
    pub fn from_encoded(encoded: &str) -> Result<Self> {
        let raw = STANDARD
            .decode(encoded.trim())
            .map_err(|e| RelayError::Credential(format!("Service account key is not valid base64: {}", e)))?;

        let json = String::from_utf8(raw)
            .map_err(|e| RelayError::Credential(format!("Service account key is not valid UTF-8: {}", e)))?;

        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let key: ServiceAccountKey = serde_json::from_str(json)
            .map_err(|e| RelayError::Credential(format!("Malformed service account key: {}", e)))?;

        if key.private_key.trim().is_empty() || key.client_email.trim().is_empty() {
            return Err(RelayError::Credential(
                "Service account key is missing private_key or client_email".to_string(),
            ));
        }

        Ok(key)
    }
}

/// A service account credential narrowed to specific scopes and bound to a
/// delegated identity.
#[derive(Debug, Clone)]
pub struct DelegatedCredentials {
    key: ServiceAccountKey,
    scopes: Vec<String>,
    subject: Option<String>,
}

/// Claims of the JWT-bearer assertion sent to the token endpoint.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct AssertionClaims {
    pub iss: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sub: Option<String>,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

/// Narrow `base` to `scopes` and have it act as `subject`.
///
/// Pure: no network, no clock.
pub fn delegate(base: &ServiceAccountKey, scopes: &[String], subject: Option<&str>) -> DelegatedCredentials {
    DelegatedCredentials {
        key: base.clone(),
        scopes: scopes.to_vec(),
        subject: subject.map(str::to_string),
    }
}

impl DelegatedCredentials {
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    pub fn token_uri(&self) -> &str {
        &self.key.token_uri
    }

    /// Build the claim set for an assertion issued at `now`.
    pub fn claims(&self, now: DateTime<Utc>) -> AssertionClaims {
        let iat = now.timestamp();
        AssertionClaims {
            iss: self.key.client_email.clone(),
            sub: self.subject.clone(),
            scope: self.scopes.join(" "),
            aud: self.key.token_uri.clone(),
            iat,
            exp: (now + Duration::seconds(ASSERTION_LIFETIME_SECS)).timestamp(),
        }
    }

    /// Sign an RS256 assertion with the service account's private key.
    pub fn assertion(&self, now: DateTime<Utc>) -> Result<String> {
        let mut header = Header::new(Algorithm::RS256);
        if !self.key.private_key_id.is_empty() {
            header.kid = Some(self.key.private_key_id.clone());
        }

        let encoding_key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| RelayError::Credential(format!("Invalid service account private key: {}", e)))?;

        encode(&header, &self.claims(now), &encoding_key)
            .map_err(|e| RelayError::Credential(format!("Failed to sign assertion: {}", e)))
    }
}
