//! HTTP surface.
//!
//! - `GET|POST /` runs one export/relay invocation and answers in plain text.
//! - `POST /upload` receives a multipart `file` field and pushes it to the
//!   SFTP server, answering with the JSON [`UploadOutcome`].
//! - `GET /health` answers `ok`.
//!
//! Both stages block, so handlers hand them to `spawn_blocking`. Blocking
//! HTTP clients are built inside those closures, never on the async side.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    routing::post,
    Json, Router,
};
use log::{error, info, warn};

use crate::cloud::transfer::{Transfer, UploadOutcome};
use crate::config::RelayConfig;
use crate::constants::{MAX_UPLOAD_BODY_BYTES, RELAY_FIELD_NAME};
use crate::pipeline::{export_and_upload, export_and_upload_from_env, TriggerResponse};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RelayConfig>,
    /// Fixed key for every invocation. When `None`, each trigger reads
    /// `SERVICE_ACCOUNT_KEY` afresh so a rotated key takes effect without
    /// a restart.
    pub service_account_key: Option<String>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(trigger).post(trigger))
        .route("/upload", post(upload))
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BODY_BYTES))
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn trigger(State(state): State<AppState>) -> impl IntoResponse {
    let config = Arc::clone(&state.config);
    let key = state.service_account_key.clone();

    let run = move || match key {
        Some(key) => export_and_upload(&config, Some(key)),
        None => export_and_upload_from_env(&config),
    };

    let response = tokio::task::spawn_blocking(run)
        .await
        .unwrap_or_else(|e| TriggerResponse::failure(&anyhow::anyhow!("Export task panicked: {}", e)));

    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, response.body)
}

async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> impl IntoResponse {
    let mut file: Option<(String, Vec<u8>)> = None;

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some(RELAY_FIELD_NAME) {
                    continue;
                }
                let filename = field.file_name().unwrap_or_default().to_string();
                match field.bytes().await {
                    Ok(bytes) => file = Some((filename, bytes.to_vec())),
                    Err(e) => {
                        warn!("Failed to read upload body: {}", e);
                        return (
                            StatusCode::BAD_REQUEST,
                            Json(UploadOutcome::error(format!("Failed to read upload: {}", e))),
                        );
                    }
                }
                break;
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Malformed multipart request: {}", e);
                return (
                    StatusCode::BAD_REQUEST,
                    Json(UploadOutcome::error(format!("Malformed multipart request: {}", e))),
                );
            }
        }
    }

    let Some((filename, data)) = file else {
        return (
            StatusCode::BAD_REQUEST,
            Json(UploadOutcome::error("No file part in request")),
        );
    };

    info!("Received {} ({} bytes) for SFTP transfer", filename, data.len());
    let config = Arc::clone(&state.config);
    let outcome = tokio::task::spawn_blocking(move || match Transfer::from_config(&config) {
        Ok(transfer) => transfer.process_csv_upload(data, &filename, &config.secret_project_id),
        Err(e) => UploadOutcome::error(e.to_string()),
    })
    .await
    .unwrap_or_else(|e| {
        error!("Transfer task panicked: {}", e);
        UploadOutcome::error(format!("Transfer task panicked: {}", e))
    });

    let status = if outcome.is_success() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(outcome))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn start_server(state: AppState, addr: &str) -> Result<()> {
    let router = create_router(state);

    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    Ok(())
}
