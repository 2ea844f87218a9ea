use std::fs;

use log::{info, warn};
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use reqwest::StatusCode;

use crate::constants::{CSV_MIME_TYPE, RELAY_FIELD_NAME};
use crate::error::{RelayError, Result};
use crate::pipeline::export::ExportFile;

/// Posts export files to the relay endpoint.
pub struct Relay {
    client: Client,
    url: String,
    destination: String,
}

impl Relay {
    pub fn new(client: Client, url: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            destination: destination.into(),
        }
    }

    /// Upload `export` once and delete it, whatever the outcome.
    pub fn send(&self, export: ExportFile) -> Result<String> {
        let row_count = export.row_count();
        let result = self.post(&export);
        export.close();

        let (status, body) = result?;
        if status == StatusCode::OK {
            info!("Relay accepted export of {} rows", row_count);
            Ok(format!(
                "Successfully exported {} rows and uploaded to {}",
                row_count, self.destination
            ))
        } else {
            warn!("Relay endpoint answered {}", status);
            Err(RelayError::Relay(format!("Error uploading to relay endpoint: {}", body)))
        }
    }

    fn post(&self, export: &ExportFile) -> Result<(StatusCode, String)> {
        let content = fs::read(export.path())
            .map_err(|e| RelayError::io(format!("Failed to read {}", export.path().display()), e))?;

        let part = Part::bytes(content)
            .file_name(export.file_name())
            .mime_str(CSV_MIME_TYPE)
            .map_err(|e| RelayError::Relay(format!("Failed to build upload: {}", e)))?;
        let form = Form::new().part(RELAY_FIELD_NAME, part);

        info!("Posting {} to {}", export.file_name(), self.url);
        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .map_err(|e| RelayError::Relay(format!("Relay request to {} failed: {}", self.url, e)))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| RelayError::Relay(format!("Failed to read relay response: {}", e)))?;
        Ok((status, body))
    }
}
