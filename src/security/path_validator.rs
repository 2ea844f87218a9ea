//! Validation of caller-supplied upload filenames.
//!
//! The transfer stage stages payloads at `<staging_dir>/<filename>` and
//! uploads them under the same name, so the name must be a single plain
//! path component: no separators, no traversal, nothing that would land the
//! file outside the staging directory or rename it remotely.

use std::path::{Component, Path, PathBuf};

use crate::error::{RelayError, Result};

/// Check that `filename` is a single, plain file name and return it unchanged.
pub fn validate_filename(filename: &str) -> Result<&str> {
    if filename.is_empty() {
        return Err(RelayError::Configuration("Filename must not be empty".to_string()));
    }

    if filename.contains('\0') {
        return Err(RelayError::Configuration("Filename contains null bytes".to_string()));
    }

    if filename.contains('/') || filename.contains('\\') {
        return Err(RelayError::Configuration(format!(
            "Filename must not contain path separators: {}",
            filename
        )));
    }

    let mut components = Path::new(filename).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(filename),
        _ => Err(RelayError::Configuration(format!("Invalid filename: {}", filename))),
    }
}

/// Local staging path for an upload.
pub fn staging_path(staging_dir: &Path, filename: &str) -> Result<PathBuf> {
    Ok(staging_dir.join(validate_filename(filename)?))
}
