//! Artifact production: the placeholder "converted" file and its handle.
//!
//! The content is a short text note describing the pretend conversion.
//! What matters is the name ([`suggested_file_name`]) and the lifetime of the
//! handle: every stored artifact holds an [`ArtifactLease`] from an
//! [`ArtifactRegistry`], and the lease is released when the artifact is
//! superseded, removed, or the session is dropped. `registry.live()` is the
//! leak check.

use crate::config::ConversionOptions;
use crate::error::ConvertError;
use crate::pipeline::intake::SelectedFile;
use chrono::{DateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// MIME type of every placeholder artifact.
pub const ARTIFACT_MIME_TYPE: &str = "text/plain";

/// Extension used when the format token has nothing usable in it.
const FALLBACK_EXTENSION: &str = "bin";

static RE_NON_EXTENSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9]+").unwrap());

/// The output of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedArtifact {
    pub content: Vec<u8>,
    pub suggested_file_name: String,
    pub mime_type: &'static str,
    /// Name of the file this was produced from.
    pub source_name: String,
    /// Options snapshot of the run that produced it.
    pub options: ConversionOptions,
    pub created_at: DateTime<Utc>,
}

impl ConvertedArtifact {
    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Builds placeholder artifacts.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArtifactFactory;

impl ArtifactFactory {
    pub fn new() -> Self {
        Self
    }

    /// Produce the artifact for `file` converted with `options`, stamped now.
    pub fn produce(&self, file: &SelectedFile, options: &ConversionOptions) -> ConvertedArtifact {
        self.produce_at(file, options, Utc::now())
    }

    /// Same as [`produce`](Self::produce) with a fixed timestamp.
    pub fn produce_at(
        &self,
        file: &SelectedFile,
        options: &ConversionOptions,
        at: DateTime<Utc>,
    ) -> ConvertedArtifact {
        let content = format!(
            "This is a simulation of the converted file.\n\
             Original: {}\n\
             Converted to: {}\n\
             Quality: {}\n\
             Size: {}\n\
             Generated: {}\n\
             \n\
             In a real application, this would be your actual converted file content.\n",
            file.name,
            options.target_format.to_uppercase(),
            options.quality,
            options.target_size,
            at.to_rfc3339_opts(SecondsFormat::Secs, true),
        );

        ConvertedArtifact {
            content: content.into_bytes(),
            suggested_file_name: suggested_file_name(&file.name, &options.target_format),
            mime_type: ARTIFACT_MIME_TYPE,
            source_name: file.name.clone(),
            options: options.clone(),
            created_at: at,
        }
    }
}

/// `<stem>_converted.<ext>`.
///
/// Only the last path component of `original_name` is used, so the result
/// never contains a path separator. `stem` is everything before its last `.`; a
/// name without a dot, or whose only dot is the leading one, is used whole.
/// `ext` is the format token reduced to ASCII letters and digits, or `bin`
/// if nothing is left.
pub fn suggested_file_name(original_name: &str, target_format: &str) -> String {
    let base = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original_name);
    let stem = match base.rfind('.') {
        Some(idx) if idx > 0 => &base[..idx],
        _ => base,
    };

    let ext = RE_NON_EXTENSION.replace_all(target_format, "");
    let ext = if ext.is_empty() {
        FALLBACK_EXTENSION
    } else {
        ext.as_ref()
    };

    format!("{}_converted.{}", stem, ext)
}

// ── Handle registry ──────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct RegistryInner {
    live: AtomicUsize,
    next_id: AtomicU64,
}

/// Issues and counts artifact handles.
///
/// Cloning shares the same counters.
#[derive(Debug, Clone, Default)]
pub struct ArtifactRegistry {
    inner: Arc<RegistryInner>,
}

impl ArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a handle for an artifact. Released when the lease is dropped.
    pub fn issue(&self, artifact: &ConvertedArtifact) -> ArtifactLease {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.live.fetch_add(1, Ordering::SeqCst);
        debug!("Opened artifact handle #{} for '{}'", id, artifact.suggested_file_name);
        ArtifactLease {
            id,
            registry: Arc::clone(&self.inner),
        }
    }

    /// Handles issued and not yet released.
    pub fn live(&self) -> usize {
        self.inner.live.load(Ordering::SeqCst)
    }
}

/// A live handle to a stored artifact.
pub struct ArtifactLease {
    id: u64,
    registry: Arc<RegistryInner>,
}

impl ArtifactLease {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Debug for ArtifactLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactLease").field("id", &self.id).finish()
    }
}

impl Drop for ArtifactLease {
    fn drop(&mut self) {
        self.registry.live.fetch_sub(1, Ordering::SeqCst);
        debug!("Released artifact handle #{}", self.id);
    }
}

// ── Download ─────────────────────────────────────────────────────────────

/// Write the artifact into `dir` under its suggested name.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn write_artifact(
    artifact: &ConvertedArtifact,
    dir: impl AsRef<Path>,
) -> Result<PathBuf, ConvertError> {
    let dir = dir.as_ref();
    let path = dir.join(&artifact.suggested_file_name);

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| ConvertError::OutputWriteFailed {
            path: path.clone(),
            source: e,
        })?;

    let tmp_path = dir.join(format!(".{}.tmp", artifact.suggested_file_name));
    tokio::fs::write(&tmp_path, &artifact.content)
        .await
        .map_err(|e| ConvertError::OutputWriteFailed {
            path: path.clone(),
            source: e,
        })?;

    if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(ConvertError::OutputWriteFailed { path, source: e });
    }

    info!("Wrote {} bytes to {}", artifact.len(), path.display());
    Ok(path)
}
