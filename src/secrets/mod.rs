//! Secret broker.
//!
//! SFTP connection details live in a managed secret store, one secret per
//! value, addressed as `projects/{project}/secrets/{name}/versions/{version}`.
//! Every lookup goes to the store; nothing is cached between calls.
//!
//! Unlike the rest of the crate, lookups return the store's own
//! [`SecretAccessError`] untouched so callers see exactly what the store said.

/// REST client for the managed secret store
pub mod secret_manager;

use thiserror::Error;

use crate::constants::DEFAULT_SECRET_VERSION;

pub use secret_manager::SecretManagerClient;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SecretAccessError {
    #[error("secret {0} not found")]
    NotFound(String),

    #[error("permission denied on secret {0}")]
    PermissionDenied(String),

    #[error("secret store unavailable: {0}")]
    Unavailable(String),

    #[error("secret {0} has an invalid payload: {1}")]
    InvalidPayload(String, String),
}

/// Read access to versioned secrets.
#[cfg_attr(test, mockall::automock)]
pub trait SecretStore: Send + Sync {
    fn access(&self, project_id: &str, secret_id: &str, version: &str) -> Result<String, SecretAccessError>;
}

/// Full resource name of a secret version.
pub fn secret_version_name(project_id: &str, secret_id: &str, version: &str) -> String {
    format!("projects/{}/secrets/{}/versions/{}", project_id, secret_id, version)
}

/// Resolve a secret, defaulting to its latest version.
pub fn get_secret(
    store: &dyn SecretStore,
    project_id: &str,
    secret_id: &str,
    version: Option<&str>,
) -> Result<String, SecretAccessError> {
    store.access(project_id, secret_id, version.unwrap_or(DEFAULT_SECRET_VERSION))
}
