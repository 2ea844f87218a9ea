//! The export/relay pipeline.
//!
//! One invocation runs the fixed warehouse query, writes the whole result
//! set to a temporary CSV file, posts that file to the relay endpoint and
//! deletes it. Everything is blocking and happens on the calling thread.
//!
//! ```text
//! SERVICE_ACCOUNT_KEY ─▶ credentials ─▶ Exporter ─▶ ExportFile ─▶ Relay ─▶ TriggerResponse
//! ```
//!
//! Any failure along the way ends the invocation; [`export_and_upload`]
//! turns it into a single 500 response carrying the error chain.

/// Query-and-export stage
pub mod export;

/// HTTP relay stage
pub mod relay;

use log::{error, info};

use crate::auth::{delegate, ServiceAccountKey, ServiceAccountTokenSource};
use crate::cloud::client::create_http_client;
use crate::config::{require_key, service_account_key, RelayConfig};
use crate::error::Result;
use crate::security::scrub_credentials;
use crate::warehouse::{BigQueryClient, Warehouse};

pub use export::{write_csv, ExportFile, Exporter};
pub use relay::Relay;

/// Status and plain-text body returned to whoever triggered the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerResponse {
    pub status: u16,
    pub body: String,
}

impl TriggerResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    /// Render an error with its full cause chain.
    ///
    /// The message is kept verbatim so a relay rejection carries the
    /// endpoint's body unchanged; only the debug chain is scrubbed.
    pub fn failure(err: &anyhow::Error) -> Self {
        Self {
            status: 500,
            body: format!("Error: {}\n\nDetails: {}", err, scrub_credentials(&format!("{:?}", err))),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Export stage followed by relay stage.
pub struct Pipeline<W: Warehouse> {
    exporter: Exporter<W>,
    relay: Relay,
}

impl<W: Warehouse> Pipeline<W> {
    pub fn new(exporter: Exporter<W>, relay: Relay) -> Self {
        Self { exporter, relay }
    }

    pub fn run(&self) -> Result<String> {
        let export = self.exporter.export()?;
        info!(
            "Exported {} rows to {}",
            export.row_count(),
            export.path().display()
        );
        self.relay.send(export)
    }
}

fn run_with_key(config: &RelayConfig, encoded_key: Option<String>) -> anyhow::Result<String> {
    // No client is built before the key is known to exist.
    let encoded = require_key(encoded_key)?;
    let key = ServiceAccountKey::from_encoded(&encoded)?;
    let credentials = delegate(&key, &config.scopes, Some(&config.delegated_user));

    let client = create_http_client()?;
    let tokens = ServiceAccountTokenSource::new(credentials, client.clone());
    let warehouse = BigQueryClient::new(
        client.clone(),
        config.warehouse_api.clone(),
        config.project_id.clone(),
        Box::new(tokens),
    )
    .with_poll_interval(std::time::Duration::from_millis(config.query_poll_interval_ms));

    let pipeline = Pipeline::new(
        Exporter::new(warehouse, config.query.clone()),
        Relay::new(client, config.relay_url.clone(), config.relay_destination.clone()),
    );

    Ok(pipeline.run()?)
}

/// Run one export/relay invocation with an explicitly supplied key.
pub fn export_and_upload(config: &RelayConfig, encoded_key: Option<String>) -> TriggerResponse {
    match run_with_key(config, encoded_key) {
        Ok(message) => {
            info!("{}", message);
            TriggerResponse::ok(message)
        }
        Err(err) => {
            error!("Export and upload failed: {}", scrub_credentials(&format!("{:#}", err)));
            TriggerResponse::failure(&err)
        }
    }
}

/// Run one invocation with the key taken from `SERVICE_ACCOUNT_KEY`.
pub fn export_and_upload_from_env(config: &RelayConfig) -> TriggerResponse {
    export_and_upload(config, service_account_key().ok())
}
