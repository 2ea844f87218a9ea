use std::fs;
use std::io;
use std::net::TcpStream;
use std::path::{Path, PathBuf};

use log::{debug, error, info};
use ssh2::{Session, Sftp};

use crate::constants::{
    DEFAULT_SFTP_PORT, SECRET_SFTP_DIRECTORY, SECRET_SFTP_HOST, SECRET_SFTP_PASSWORD, SECRET_SFTP_USERNAME,
};
use crate::error::{RelayError, Result};
use crate::secrets::{get_secret, SecretStore};
use crate::security::safe_error_message;

/// An authenticated file-transfer session layered over a transport.
#[cfg_attr(test, mockall::automock)]
pub trait TransferSession {
    /// Make `dir` the directory later uploads land in.
    fn change_dir(&mut self, dir: &str) -> Result<()>;

    /// Upload `local_path` as `remote_filename` inside the current directory.
    fn put(&mut self, local_path: &Path, remote_filename: &str) -> Result<u64>;

    /// Close the file-transfer channel, leaving the transport open.
    fn close_session(&mut self);

    /// Tear down the transport.
    fn close_transport(&mut self);
}

/// Opens transfer sessions: transport, authentication and subsystem in one go.
#[cfg_attr(test, mockall::automock)]
pub trait TransferConnector: Send + Sync {
    fn connect(&self, host: &str, port: u16, username: &str, password: &str) -> Result<Box<dyn TransferSession>>;
}

/// Password-authenticated SFTP over libssh2.
#[derive(Debug, Default, Clone)]
pub struct Ssh2Connector;

impl TransferConnector for Ssh2Connector {
    fn connect(&self, host: &str, port: u16, username: &str, password: &str) -> Result<Box<dyn TransferSession>> {
        let tcp = TcpStream::connect((host, port))
            .map_err(|e| RelayError::Transfer(format!("Failed to connect to {}:{}: {}", host, port, e)))?;

        let mut session =
            Session::new().map_err(|e| RelayError::Transfer(format!("Failed to create SSH session: {}", e)))?;
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| RelayError::Transfer(format!("Failed to perform SSH handshake: {}", e)))?;

        session
            .userauth_password(username, password)
            .map_err(|e| RelayError::Transfer(format!("Failed to authenticate as {}: {}", username, e)))?;

        if !session.authenticated() {
            return Err(RelayError::Transfer("Authentication failed".to_string()));
        }

        let sftp = session
            .sftp()
            .map_err(|e| RelayError::Transfer(format!("Failed to create SFTP subsystem: {}", e)))?;

        debug!("Opened SFTP session to {}@{}:{}", username, host, port);
        Ok(Box::new(Ssh2Session {
            session,
            sftp: Some(sftp),
            cwd: None,
        }))
    }
}

struct Ssh2Session {
    session: Session,
    sftp: Option<Sftp>,
    cwd: Option<PathBuf>,
}

impl Ssh2Session {
    fn sftp(&self) -> Result<&Sftp> {
        self.sftp
            .as_ref()
            .ok_or_else(|| RelayError::Transfer("SFTP session already closed".to_string()))
    }
}

impl TransferSession for Ssh2Session {
    // SFTP has no server-side working directory; resolve and remember it.
    fn change_dir(&mut self, dir: &str) -> Result<()> {
        let requested = match &self.cwd {
            Some(cwd) => cwd.join(dir),
            None => PathBuf::from(dir),
        };

        let sftp = self.sftp()?;
        let resolved = sftp
            .realpath(&requested)
            .map_err(|e| RelayError::Transfer(format!("Cannot resolve {}: {}", dir, e)))?;
        let stat = sftp
            .stat(&resolved)
            .map_err(|e| RelayError::Transfer(format!("Cannot stat {}: {}", resolved.display(), e)))?;

        if !stat.is_dir() {
            return Err(RelayError::Transfer(format!("{} is not a directory", resolved.display())));
        }

        self.cwd = Some(resolved);
        Ok(())
    }

    fn put(&mut self, local_path: &Path, remote_filename: &str) -> Result<u64> {
        let target = match &self.cwd {
            Some(cwd) => cwd.join(remote_filename),
            None => PathBuf::from(remote_filename),
        };

        let mut local = fs::File::open(local_path)
            .map_err(|e| RelayError::io(format!("Failed to open local file {}", local_path.display()), e))?;

        let mut remote = self
            .sftp()?
            .create(&target)
            .map_err(|e| RelayError::Transfer(format!("Failed to create remote file {}: {}", target.display(), e)))?;

        io::copy(&mut local, &mut remote)
            .map_err(|e| RelayError::Transfer(format!("Failed to write to remote file {}: {}", target.display(), e)))
    }

    fn close_session(&mut self) {
        self.sftp.take();
    }

    fn close_transport(&mut self) {
        self.sftp.take();
        if let Err(e) = self.session.disconnect(None, "closing", None) {
            debug!("SSH disconnect reported: {}", e);
        }
    }
}

/// Delivers local files to the SFTP server named by the secret store.
pub struct SftpUploader {
    secrets: Box<dyn SecretStore>,
    connector: Box<dyn TransferConnector>,
    port: u16,
}

impl SftpUploader {
    pub fn new(secrets: Box<dyn SecretStore>, connector: Box<dyn TransferConnector>) -> Self {
        Self {
            secrets,
            connector,
            port: DEFAULT_SFTP_PORT,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Upload `local_path` as `remote_filename`.
    ///
    /// Never fails loudly: every error is logged and reported as `false`.
    pub fn upload_to_sftp(&self, local_path: &Path, remote_filename: &str, project_id: &str) -> bool {
        match self.try_upload(local_path, remote_filename, project_id) {
            Ok(uploaded) => uploaded,
            Err(e) => {
                error!("{}", safe_error_message("Error uploading file to SFTP", &e));
                false
            }
        }
    }

    fn try_upload(&self, local_path: &Path, remote_filename: &str, project_id: &str) -> Result<bool> {
        // Fetched on every call; the store is the source of truth.
        let store = self.secrets.as_ref();
        let host = get_secret(store, project_id, SECRET_SFTP_HOST, None)?;
        let username = get_secret(store, project_id, SECRET_SFTP_USERNAME, None)?;
        let password = get_secret(store, project_id, SECRET_SFTP_PASSWORD, None)?;
        let directory = get_secret(store, project_id, SECRET_SFTP_DIRECTORY, None)?;

        info!("Uploading to SFTP server: {}...", host);
        let mut session = self.connector.connect(&host, self.port, &username, &password)?;

        if let Err(e) = session.change_dir(&directory) {
            error!("Directory {} not found or inaccessible: {}", directory, e);
            session.close_transport();
            return Ok(false);
        }

        let bytes = match session.put(local_path, remote_filename) {
            Ok(bytes) => bytes,
            Err(e) => {
                session.close_transport();
                return Err(e);
            }
        };

        session.close_session();
        session.close_transport();

        info!(
            "Successfully uploaded {} to {}/{} ({} bytes)",
            local_path.display(),
            directory,
            remote_filename,
            bytes
        );
        Ok(true)
    }
}
