//! Credential broker for warehouse and secret store access.
//!
//! The warehouse is reached with a service account key supplied through the
//! environment. The key is decoded, narrowed to a fixed set of scopes and
//! bound to a delegated identity, then exchanged for a short-lived bearer
//! token. Nothing is persisted; every invocation builds its own credential.
//!
//! ```text
//! SERVICE_ACCOUNT_KEY ──▶ ServiceAccountKey ──delegate()──▶ DelegatedCredentials
//!                                                              │ assertion (RS256 JWT)
//!                                                              ▼
//!                                                   ServiceAccountTokenSource ──▶ access token
//! ```
//!
//! The secret store uses the ambient identity of the host instead, through
//! [`token::MetadataTokenSource`].

/// Service account key parsing and capability narrowing
pub mod service_account;

/// Bearer token acquisition
pub mod token;

pub use service_account::{delegate, DelegatedCredentials, ServiceAccountKey};
pub use token::{MetadataTokenSource, ServiceAccountTokenSource, TokenSource};
