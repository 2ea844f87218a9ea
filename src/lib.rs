//! # warehouse-relay
//!
//! Exports a table from a managed analytics warehouse to CSV and relays it
//! to two downstream destinations: an HTTP upload endpoint and an SFTP server.
//!
//! ## Overview
//!
//! The crate is a two-stage pipeline invoked on demand, by a scheduler or an
//! HTTP trigger:
//!
//! - **Export/relay**: a service account key from `SERVICE_ACCOUNT_KEY` is
//!   narrowed to warehouse and read-only file-store scopes and bound to a
//!   delegated identity. The fixed query runs, the full result set is written
//!   to a temporary CSV file, and that file is posted as `multipart/form-data`
//!   to the relay endpoint, then deleted.
//! - **Transfer**: an arbitrary payload is staged locally and uploaded over
//!   SFTP using host, username, password and directory pulled fresh from the
//!   secret store. The staged file is removed whether or not the upload worked.
//!
//! Every call blocks the calling thread. Nothing is retried.
//!
//! ## Usage
//!
//! ```no_run
//! use warehouse_relay::config::RelayConfig;
//! use warehouse_relay::pipeline::export_and_upload_from_env;
//!
//! let config = RelayConfig::default();
//! let response = export_and_upload_from_env(&config);
//! println!("{} {}", response.status, response.body);
//! ```
//!
//! ## Module Organization
//!
//! - [`cli`]: Command-line interface definitions and argument parsing
//! - [`config`]: Configuration struct, YAML loading and environment lookups
//! - [`auth`]: Service account credentials and token acquisition
//! - [`warehouse`]: Warehouse query client
//! - [`pipeline`]: Export and relay stages and the trigger that runs them
//! - [`secrets`]: Secret store access
//! - [`cloud`]: SFTP transfer
//! - [`server`]: HTTP trigger and upload receiver
//! - [`security`]: Credential scrubbing and filename validation
//! - [`error`]: Error taxonomy
//! - [`constants`]: Application-wide constants

/// Command-line interface definitions and argument parsing
pub mod cli;

/// Configuration management
pub mod config;

/// Application constants and production defaults
pub mod constants;

/// Error types shared by all stages
pub mod error;

/// Credential broker
pub mod auth;

/// Warehouse query client
pub mod warehouse;

/// Export and relay stages
pub mod pipeline;

/// Secret broker
pub mod secrets;

/// SFTP transfer stage
pub mod cloud;

/// HTTP trigger and upload receiver
pub mod server;

/// Security utilities for credential protection and filename validation
pub mod security;

pub use error::{RelayError, Result};
