//! Error types for the convsim library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ValidationError`] is **recoverable**. The user picked a file the
//!   session will not accept (missing, too large, unsupported type). It is
//!   reported through [`crate::observer::SessionObserver::on_validation_rejected`]
//!   and returned inside [`crate::session::SelectOutcome::Rejected`]; the
//!   session state is left untouched and the user simply selects again.
//!
//! * [`ConvertError`] covers **misuse and I/O**. An operation was called from a
//!   state that does not allow it, the configuration is invalid, or the
//!   artifact could not be written. These are integration bugs or
//!   environment failures and surface as `Err(ConvertError)`.
//!
//! The simulated pipeline itself never fails, so there is no per-run error
//! type.

use crate::session::SessionState;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Why a selected file was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum ValidationError {
    /// No file was supplied.
    #[error("No file selected")]
    NoFile,

    /// File exceeds the configured size limit.
    #[error("File is too large: {size} bytes (maximum is {limit} bytes)")]
    TooLarge { size: u64, limit: u64 },

    /// MIME type is present but not one of the accepted families.
    #[error("Unsupported file type '{mime}'")]
    UnsupportedType { mime: String },
}

impl ValidationError {
    /// Stable machine-readable reason token.
    pub fn reason(&self) -> &'static str {
        match self {
            ValidationError::NoFile => "no-file",
            ValidationError::TooLarge { .. } => "too-large",
            ValidationError::UnsupportedType { .. } => "unsupported-type",
        }
    }
}

/// All non-validation errors returned by the convsim library.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── State-machine misuse ──────────────────────────────────────────────
    /// Operation is not allowed in the session's current state.
    #[error("'{operation}' is not allowed while the session is {state}")]
    InvalidTransition {
        operation: &'static str,
        state: SessionState,
    },

    /// `start_conversion` was called with no file selected.
    #[error("Cannot start a conversion: no file is selected")]
    NoFileSelected,

    /// A progress tick went backwards within one run.
    #[error("Progress regressed from {last}% to {got}%")]
    ProgressRegressed { last: u8, got: u8 },

    /// Completion or a tick arrived out of order: before the 100% tick, or
    /// after it had already been seen.
    #[error("Progress out of order: a run needs exactly one terminal 100% tick, then completion")]
    OutOfOrderCompletion,

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the artifact file.
    #[error("Failed to write artifact '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not read metadata of an input file.
    #[error("Failed to read input file '{path}': {source}")]
    InputReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}
