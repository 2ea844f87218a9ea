//! Integration tests for the HTTP surface.
//!
//! The router runs on its own tokio runtime; requests come from a blocking
//! client on the test thread, the same way a scheduler would call it.

mod common;

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use tempfile::TempDir;

use warehouse_relay::cloud::transfer::{UploadOutcome, UploadStatus};
use warehouse_relay::config::RelayConfig;

use common::{AppServer, SilentListener};

#[test]
fn test_health_check() {
    let server = AppServer::start(RelayConfig::default(), None);

    let response = Client::new().get(format!("{}/health", server.base)).send().unwrap();

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.text().unwrap(), "ok");
}

#[test]
fn test_trigger_without_key_answers_500() {
    let server = AppServer::start(RelayConfig::default(), None);

    let response = Client::new().get(format!("{}/", server.base)).send().unwrap();

    assert_eq!(response.status().as_u16(), 500);
    let body = response.text().unwrap();
    assert!(body.starts_with("Error: "));
    assert!(body.contains("SERVICE_ACCOUNT_KEY"));
}

#[test]
fn test_upload_without_file_part_is_bad_request() {
    let server = AppServer::start(RelayConfig::default(), None);

    let form = Form::new().text("note", "no file here");
    let response = Client::new()
        .post(format!("{}/upload", server.base))
        .multipart(form)
        .send()
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    let outcome: UploadOutcome = response.json().unwrap();
    assert_eq!(outcome, UploadOutcome::error("No file part in request"));
}

#[test]
fn test_upload_with_failing_secret_store_fails_and_cleans_up() {
    let staging = TempDir::new().unwrap();
    let metadata = SilentListener::bind();
    let config = RelayConfig {
        staging_dir: staging.path().to_path_buf(),
        metadata_token_url: metadata.url.clone(),
        ..RelayConfig::default()
    };
    let server = AppServer::start(config, None);

    let part = Part::bytes(b"id,name\n1,Alice\n".to_vec())
        .file_name("ramp.csv")
        .mime_str("text/csv")
        .unwrap();
    let response = Client::new()
        .post(format!("{}/upload", server.base))
        .multipart(Form::new().part("file", part))
        .send()
        .unwrap();

    assert_eq!(response.status().as_u16(), 500);
    let outcome: UploadOutcome = response.json().unwrap();
    assert_eq!(outcome.status, UploadStatus::Error);
    assert_eq!(outcome.message, "Failed to upload file");
    assert!(!staging.path().join("ramp.csv").exists());
}
