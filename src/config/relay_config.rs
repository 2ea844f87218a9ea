use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::constants::*;

/// Everything the pipeline needs that is not a secret.
///
/// Passed into each stage at construction so tests can point the
/// warehouse, token and relay URLs at local listeners.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RelayConfig {
    /// Project the warehouse jobs run under
    pub project_id: String,
    /// Query whose full result set is exported
    pub query: String,
    /// Identity the service account acts as
    pub delegated_user: String,
    /// Scopes requested for the delegated credential
    pub scopes: Vec<String>,
    pub relay_url: String,
    pub relay_destination: String,
    /// Project holding the SFTP secrets
    pub secret_project_id: String,
    pub sftp_port: u16,
    pub staging_dir: PathBuf,
    pub warehouse_api: String,
    pub secret_api: String,
    pub metadata_token_url: String,
    pub query_poll_interval_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            project_id: DEFAULT_PROJECT_ID.to_string(),
            query: DEFAULT_QUERY.to_string(),
            delegated_user: DEFAULT_DELEGATED_USER.to_string(),
            scopes: vec![
                SCOPE_WAREHOUSE.to_string(),
                SCOPE_FILE_STORE_READONLY.to_string(),
            ],
            relay_url: DEFAULT_RELAY_URL.to_string(),
            relay_destination: DEFAULT_RELAY_DESTINATION.to_string(),
            secret_project_id: DEFAULT_PROJECT_ID.to_string(),
            sftp_port: DEFAULT_SFTP_PORT,
            staging_dir: PathBuf::from(DEFAULT_STAGING_DIR),
            warehouse_api: DEFAULT_WAREHOUSE_API.to_string(),
            secret_api: DEFAULT_SECRET_API.to_string(),
            metadata_token_url: DEFAULT_METADATA_TOKEN_URL.to_string(),
            query_poll_interval_ms: QUERY_POLL_INTERVAL_MS,
        }
    }
}

impl RelayConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let config: RelayConfig =
            serde_yaml::from_str(&content).context("Failed to parse YAML config")?;

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save_to_yaml_file(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml).context(format!("Failed to write config to {}", path.display()))?;

        info!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Create a default configuration YAML file
    pub fn create_default_config_file(path: &Path) -> Result<()> {
        Self::default().save_to_yaml_file(path)
    }
}

/// Load the config file if one was given, otherwise fall back to the defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<RelayConfig> {
    match path {
        Some(path) => RelayConfig::from_yaml_file(path),
        None => {
            debug!("No config file given, using built-in defaults");
            Ok(RelayConfig::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_values() {
        let config = RelayConfig::default();
        assert_eq!(config.sftp_port, 22);
        assert_eq!(config.staging_dir, PathBuf::from("/tmp"));
        assert_eq!(config.scopes.len(), 2);
        assert!(config.query.starts_with("SELECT * FROM"));
        assert!(config.relay_url.ends_with("/upload"));
    }

    #[test]
    fn test_yaml_round_trip() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("relay.yaml");

        let mut config = RelayConfig::default();
        config.relay_url = "http://127.0.0.1:9999/upload".to_string();
        config.save_to_yaml_file(&path)?;

        let loaded = RelayConfig::from_yaml_file(&path)?;
        assert_eq!(loaded, config);
        Ok(())
    }

    #[test]
    fn test_partial_yaml_uses_defaults() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("partial.yaml");
        fs::write(&path, "project_id: other-project\nsftp_port: 2222\n")?;

        let config = load_or_default(Some(&path))?;
        assert_eq!(config.project_id, "other-project");
        assert_eq!(config.sftp_port, 2222);
        assert_eq!(config.delegated_user, DEFAULT_DELEGATED_USER);
        Ok(())
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(load_or_default(Some(Path::new("/nonexistent/relay.yaml"))).is_err());
    }
}
