//! Error taxonomy for the export/relay pipeline.
//!
//! Each stage reports failures through one variant of [`RelayError`]. The
//! trigger in [`crate::pipeline`] is the only place these are flattened into a
//! single response; the transfer path converts them into an
//! [`crate::cloud::transfer::UploadOutcome`] instead.

use thiserror::Error;

use crate::secrets::SecretAccessError;

/// Convenience alias used across the library.
pub type Result<T> = std::result::Result<T, RelayError>;

#[derive(Debug, Error)]
pub enum RelayError {
    /// Required environment or configuration value is missing or unusable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Credential material is malformed or was rejected by the token endpoint.
    #[error("credential error: {0}")]
    Credential(String),

    /// The warehouse query could not be submitted, executed, or decoded.
    #[error("query error: {0}")]
    Query(String),

    /// The relay endpoint answered with something other than 200.
    #[error("{0}")]
    Relay(String),

    /// A secret store lookup failed.
    #[error("secret access error: {0}")]
    SecretAccess(#[from] SecretAccessError),

    /// Transport, authentication, session or upload failure on the SFTP side.
    #[error("transfer error: {0}")]
    Transfer(String),

    /// Local filesystem failure while staging a file.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl RelayError {
    /// Wrap an I/O error with a short description of what was being attempted.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        RelayError::Io {
            context: context.into(),
            source,
        }
    }

    /// Short class name, used in log lines and the trigger response.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::Configuration(_) => "ConfigurationError",
            RelayError::Credential(_) => "CredentialError",
            RelayError::Query(_) => "QueryError",
            RelayError::Relay(_) => "RelayError",
            RelayError::SecretAccess(_) => "SecretAccessError",
            RelayError::Transfer(_) => "TransferError",
            RelayError::Io { .. } => "IoError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(RelayError::Configuration("x".into()).kind(), "ConfigurationError");
        assert_eq!(RelayError::Query("x".into()).kind(), "QueryError");
        assert_eq!(
            RelayError::SecretAccess(SecretAccessError::NotFound("SFTP_HOST".into())).kind(),
            "SecretAccessError"
        );
    }

    #[test]
    fn test_io_error_display_keeps_context() {
        let err = RelayError::io(
            "Failed to create /tmp/x.csv",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.to_string(), "Failed to create /tmp/x.csv: denied");
    }

    #[test]
    fn test_relay_error_is_verbatim() {
        let err = RelayError::Relay("Error uploading to relay endpoint: bad gateway".into());
        assert_eq!(err.to_string(), "Error uploading to relay endpoint: bad gateway");
    }
}
