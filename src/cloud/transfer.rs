use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::auth::MetadataTokenSource;
use crate::cloud::client::create_http_client;
use crate::cloud::sftp::{SftpUploader, Ssh2Connector};
use crate::config::RelayConfig;
use crate::constants::SCOPE_CLOUD_PLATFORM;
use crate::error::{RelayError, Result};
use crate::secrets::SecretManagerClient;
use crate::security::{scrub_credentials, staging_path};

/// Content handed to [`Transfer::process_csv_upload`].
pub enum Payload {
    Bytes(Vec<u8>),
    Reader(Box<dyn Read + Send>),
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Bytes(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Payload::Bytes(bytes.to_vec())
    }
}

impl From<Box<dyn Read + Send>> for Payload {
    fn from(reader: Box<dyn Read + Send>) -> Self {
        Payload::Reader(reader)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Success,
    Error,
}

/// Result of one transfer, returned instead of an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadOutcome {
    pub status: UploadStatus,
    pub message: String,
}

impl UploadOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: UploadStatus::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: UploadStatus::Error,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == UploadStatus::Success
    }
}

/// A payload written to local disk, removed on drop if still present.
struct StagedFile {
    path: PathBuf,
    removed: bool,
}

impl StagedFile {
    /// Claim `path` before anything is written so a failed write is cleaned up too.
    fn claim(path: PathBuf) -> Self {
        Self { path, removed: false }
    }

    fn write(&self, payload: Payload) -> Result<u64> {
        let mut file = fs::File::create(&self.path)
            .map_err(|e| RelayError::io(format!("Failed to create {}", self.path.display()), e))?;

        let written = match payload {
            Payload::Bytes(bytes) => {
                file.write_all(&bytes)
                    .map_err(|e| RelayError::io(format!("Failed to write {}", self.path.display()), e))?;
                bytes.len() as u64
            }
            Payload::Reader(mut reader) => io::copy(&mut reader, &mut file)
                .map_err(|e| RelayError::io(format!("Failed to write {}", self.path.display()), e))?,
        };

        file.sync_all()
            .map_err(|e| RelayError::io(format!("Failed to flush {}", self.path.display()), e))?;
        Ok(written)
    }

    fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the file, reporting failures other than "already gone".
    fn remove(mut self) -> Result<()> {
        self.removed = true;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RelayError::io(format!("Failed to remove {}", self.path.display()), e)),
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.removed || !self.path.exists() {
            return;
        }
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to remove staged file {}: {}", self.path.display(), e);
        }
    }
}

/// Stages payloads locally and pushes them to the SFTP server.
pub struct Transfer {
    uploader: SftpUploader,
    staging_dir: PathBuf,
}

impl Transfer {
    pub fn new(uploader: SftpUploader, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            uploader,
            staging_dir: staging_dir.into(),
        }
    }

    /// Production wiring: secret store via the host identity, SFTP over libssh2.
    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        let client = create_http_client()?;
        let tokens = MetadataTokenSource::new(
            config.metadata_token_url.clone(),
            vec![SCOPE_CLOUD_PLATFORM.to_string()],
            client.clone(),
        );
        let secrets = SecretManagerClient::new(client, config.secret_api.clone(), Box::new(tokens));
        let uploader = SftpUploader::new(Box::new(secrets), Box::new(Ssh2Connector)).with_port(config.sftp_port);

        Ok(Self::new(uploader, config.staging_dir.clone()))
    }

    /// Persist `payload` as `filename`, upload it, and always clean up.
    pub fn process_csv_upload(&self, payload: impl Into<Payload>, filename: &str, project_id: &str) -> UploadOutcome {
        match self.stage_and_upload(payload.into(), filename, project_id) {
            Ok(true) => {
                info!("File {} uploaded successfully", filename);
                UploadOutcome::success(format!("File {} uploaded successfully", filename))
            }
            Ok(false) => UploadOutcome::error("Failed to upload file"),
            Err(e) => {
                let message = scrub_credentials(&e.to_string());
                error!("Error processing upload: {}", message);
                UploadOutcome::error(message)
            }
        }
    }

    fn stage_and_upload(&self, payload: Payload, filename: &str, project_id: &str) -> Result<bool> {
        let staged = StagedFile::claim(staging_path(&self.staging_dir, filename)?);
        let bytes = staged.write(payload)?;
        info!("Staged {} bytes at {}", bytes, staged.path().display());

        let uploaded = self.uploader.upload_to_sftp(staged.path(), filename, project_id);
        staged.remove()?;
        Ok(uploaded)
    }
}
