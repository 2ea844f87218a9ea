//! Outbound transfer to the remote file-transfer server.
//!
//! The transfer stage takes an arbitrary payload, stages it under the
//! configured staging directory, and pushes it to an SFTP server whose
//! host, credentials and target directory come from the secret store on
//! every call.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐
//! │ process_csv_    │────▶│  Staged file    │  <staging_dir>/<filename>
//! │ upload          │     └────────┬────────┘
//! └─────────────────┘              │
//!                         ┌────────▼────────┐     ┌────────────────┐
//!                         │  SftpUploader   │────▶│  Secret store  │
//!                         └────────┬────────┘     └────────────────┘
//!                                  │ host:22, password auth
//!                         ┌────────▼────────┐
//!                         │  SFTP Server    │  chdir, put
//!                         └─────────────────┘
//! ```
//!
//! ## Usage Example
//!
//! ```no_run
//! use warehouse_relay::cloud::transfer::Transfer;
//! use warehouse_relay::config::RelayConfig;
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = RelayConfig::default();
//! let transfer = Transfer::from_config(&config)?;
//!
//! let outcome = transfer.process_csv_upload(b"id,name\n1,a\n".to_vec(), "report.csv", "my-project");
//! println!("{}: {}", serde_json::to_string(&outcome.status)?, outcome.message);
//! # Ok(())
//! # }
//! ```

/// HTTP client construction shared by the cloud API callers
pub mod client;

/// SFTP session handling and the upload state machine
pub mod sftp;

/// Payload staging and cleanup around an SFTP upload
pub mod transfer;
