//! Global constants for the warehouse relay.
//!
//! Production defaults live here; [`crate::config::RelayConfig::default`]
//! copies them into the configuration struct so tests can swap any of them.

// Environment
/// Base64-encoded service account key used for warehouse access
pub const SERVICE_ACCOUNT_KEY_VAR: &str = "SERVICE_ACCOUNT_KEY";

/// Optional path to a YAML configuration file
pub const CONFIG_PATH_VAR: &str = "RELAY_CONFIG";

// Warehouse
/// Project that owns the warehouse jobs
pub const DEFAULT_PROJECT_ID: &str = "wondle-reports-452716";

/// Fixed export query
pub const DEFAULT_QUERY: &str =
    "SELECT * FROM `wondle-reports-452716.wondle_scans.ramp_report_draft`";

/// Identity the service account impersonates
pub const DEFAULT_DELEGATED_USER: &str = "serviceaccount@wondle.io";

/// Read/write access to the warehouse
pub const SCOPE_WAREHOUSE: &str = "https://www.googleapis.com/auth/bigquery";

/// Read-only access to the file store backing external tables
pub const SCOPE_FILE_STORE_READONLY: &str = "https://www.googleapis.com/auth/drive.readonly";

/// Scope requested for the secret store via the ambient identity
pub const SCOPE_CLOUD_PLATFORM: &str = "https://www.googleapis.com/auth/cloud-platform";

pub const DEFAULT_WAREHOUSE_API: &str = "https://bigquery.googleapis.com/bigquery/v2";
pub const DEFAULT_SECRET_API: &str = "https://secretmanager.googleapis.com/v1";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Server-side wait per jobs.query / getQueryResults call (ms)
pub const QUERY_TIMEOUT_MS: u64 = 10_000;

/// Delay between polls while a job is still running (ms)
pub const QUERY_POLL_INTERVAL_MS: u64 = 1_000;

/// Lifetime of a signed JWT assertion (seconds)
pub const ASSERTION_LIFETIME_SECS: i64 = 3600;

// Relay
/// HTTP endpoint receiving the exported CSV
pub const DEFAULT_RELAY_URL: &str =
    "https://ramp-sftp-uploader-546663743745.europe-west2.run.app/upload";

/// Human-readable name of the relay destination
pub const DEFAULT_RELAY_DESTINATION: &str = "RAMP Data Upload";

/// Multipart field carrying the file
pub const RELAY_FIELD_NAME: &str = "file";

pub const CSV_MIME_TYPE: &str = "text/csv";

// Secrets
pub const DEFAULT_SECRET_VERSION: &str = "latest";
pub const SECRET_SFTP_HOST: &str = "SFTP_HOST";
pub const SECRET_SFTP_USERNAME: &str = "SFTP_USERNAME";
pub const SECRET_SFTP_PASSWORD: &str = "SFTP_PASSWORD";
pub const SECRET_SFTP_DIRECTORY: &str = "SFTP_DIRECTORY";

// Transfer
pub const DEFAULT_SFTP_PORT: u16 = 22;

/// Local directory where transfer payloads are staged
pub const DEFAULT_STAGING_DIR: &str = "/tmp";

// Server
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Upper bound for multipart bodies accepted by `/upload` (64MB)
pub const MAX_UPLOAD_BODY_BYTES: usize = 64 * 1024 * 1024;
