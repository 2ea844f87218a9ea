//! Security utilities.
//!
//! This module provides:
//! - Credential scrubbing to prevent sensitive data exposure in logs and responses
//! - Filename validation for staged uploads

pub mod credential_scrubber;
pub mod path_validator;

pub use credential_scrubber::{safe_error_message, scrub_credentials};
pub use path_validator::{staging_path, validate_filename};
