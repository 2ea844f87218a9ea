use std::path::PathBuf;

use crate::constants::{CONFIG_PATH_VAR, SERVICE_ACCOUNT_KEY_VAR};
use crate::error::{RelayError, Result};

/// Read an environment variable, treating empty or whitespace-only values as unset.
pub fn read_env_var(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

/// Fetch the base64-encoded service account key from the environment.
pub fn service_account_key() -> Result<String> {
    require_key(read_env_var(SERVICE_ACCOUNT_KEY_VAR))
}

/// Turn an optional key into the value the credential broker needs.
///
/// Split out from [`service_account_key`] so callers holding the value
/// already (the HTTP trigger, tests) get the same error.
pub(crate) fn require_key(value: Option<String>) -> Result<String> {
    match value {
        Some(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(RelayError::Configuration(format!(
            "{} environment variable is not set",
            SERVICE_ACCOUNT_KEY_VAR
        ))),
    }
}

/// Optional config file path from `RELAY_CONFIG`
pub fn config_path_from_env() -> Option<PathBuf> {
    read_env_var(CONFIG_PATH_VAR).map(PathBuf::from)
}
