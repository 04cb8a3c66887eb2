//! File intake: capture file metadata and decide whether to accept it.
//!
//! Only metadata is ever looked at; the simulated pipeline never reads file
//! contents. [`validate`] is a pure function so the session can run it on
//! every selection without side effects, and so the rule order can be tested
//! in isolation.

use crate::config::SessionConfig;
use crate::error::{ConvertError, ValidationError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Metadata of the file a user picked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedFile {
    pub name: String,
    pub size_bytes: u64,
    /// Reported MIME type; empty when the source could not tell.
    pub mime_type: String,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, size_bytes: u64, mime_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size_bytes,
            mime_type: mime_type.into(),
        }
    }

    /// Capture metadata of a local file.
    ///
    /// The MIME type is guessed from the extension; an unknown extension
    /// yields an empty type, the same thing a browser reports.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ConvertError> {
        let path = path.as_ref();
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| ConvertError::InputReadFailed {
                path: path.to_path_buf(),
                source: e,
            })?;

        if !meta.is_file() {
            return Err(ConvertError::InputReadFailed {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file"),
            });
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime_type = mime_guess::from_path(path)
            .first_raw()
            .unwrap_or("")
            .to_string();

        debug!(
            "Captured '{}': {} bytes, mime '{}'",
            name,
            meta.len(),
            mime_type
        );

        Ok(Self::new(name, meta.len(), mime_type))
    }

    /// Human-readable size: `0 Bytes`, `512 Bytes`, `1.5 KB`, `2 GB`.
    pub fn display_size(&self) -> String {
        format_file_size(self.size_bytes)
    }
}

/// Format a byte count in the largest fitting base-1024 unit, at most two
/// decimals, trailing zeros dropped.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut unit = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rendered = format!("{:.2}", value);
    let rendered = rendered.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", rendered, UNITS[unit])
}

/// Accept or reject a selection. First failing rule wins:
///
/// 1. a file must be present
/// 2. its size must not exceed `config.max_file_size_bytes`
/// 3. a non-empty MIME type must start with an accepted prefix
pub fn validate(file: Option<&SelectedFile>, config: &SessionConfig) -> Result<(), ValidationError> {
    let file = file.ok_or(ValidationError::NoFile)?;

    if file.size_bytes > config.max_file_size_bytes {
        return Err(ValidationError::TooLarge {
            size: file.size_bytes,
            limit: config.max_file_size_bytes,
        });
    }

    if !file.mime_type.is_empty()
        && !config
            .accepted_mime_prefixes
            .iter()
            .any(|prefix| file.mime_type.starts_with(prefix.as_str()))
    {
        return Err(ValidationError::UnsupportedType {
            mime: file.mime_type.clone(),
        });
    }

    Ok(())
}

/// [`validate`] against the default limits.
pub fn validate_default(file: Option<&SelectedFile>) -> Result<(), ValidationError> {
    validate(file, &SessionConfig::default())
}
