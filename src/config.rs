//! Configuration types for a conversion session.
//!
//! Two kinds of configuration exist and they have different lifetimes:
//!
//! * [`SessionConfig`] is fixed when the session is created: validation
//!   limits, the progress schedule, and the observer that renders events.
//! * [`ConversionOptions`] is what the user picked in the form controls
//!   (format, quality, size). It is cloned into the session at the instant
//!   a conversion starts, so later edits to the controls never leak into an
//!   in-flight or completed run.
//!
//! Both are built via builders that validate on `build()`.

use crate::error::ConvertError;
use crate::observer::ObserverHandle;
use crate::pipeline::simulate::ProgressSchedule;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default upload limit: 500 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 500 * 1024 * 1024;

/// MIME families accepted by default.
pub const DEFAULT_MIME_PREFIXES: [&str; 5] = ["video/", "audio/", "image/", "application/", "text/"];

/// Configuration for a [`crate::session::ConversionSession`].
///
/// # Example
/// ```rust
/// use convsim::{ProgressSchedule, SessionConfig};
/// use std::time::Duration;
///
/// let config = SessionConfig::builder()
///     .max_file_size_bytes(10 * 1024 * 1024)
///     .schedule(ProgressSchedule::Stepped { interval: Duration::from_millis(100) })
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct SessionConfig {
    /// Largest accepted file, inclusive. Default: 500 MiB.
    pub max_file_size_bytes: u64,

    /// A non-empty MIME type must start with one of these. An empty MIME
    /// type is always accepted; browsers and filesystems often cannot tell.
    pub accepted_mime_prefixes: Vec<String>,

    /// How the simulated pipeline paces its ticks. Default: six discrete
    /// steps 800 ms apart.
    pub schedule: ProgressSchedule,

    /// Receives every state-change notification. Default: none.
    pub observer: Option<ObserverHandle>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE,
            accepted_mime_prefixes: DEFAULT_MIME_PREFIXES.iter().map(|p| p.to_string()).collect(),
            schedule: ProgressSchedule::default(),
            observer: None,
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("max_file_size_bytes", &self.max_file_size_bytes)
            .field("accepted_mime_prefixes", &self.accepted_mime_prefixes)
            .field("schedule", &self.schedule)
            .field("observer", &self.observer.as_ref().map(|_| "<dyn SessionObserver>"))
            .finish()
    }
}

impl SessionConfig {
    /// Create a new builder for `SessionConfig`.
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`SessionConfig`].
#[derive(Debug)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    pub fn max_file_size_bytes(mut self, bytes: u64) -> Self {
        self.config.max_file_size_bytes = bytes;
        self
    }

    pub fn accepted_mime_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.accepted_mime_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    pub fn schedule(mut self, schedule: ProgressSchedule) -> Self {
        self.config.schedule = schedule;
        self
    }

    pub fn observer(mut self, observer: ObserverHandle) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<SessionConfig, ConvertError> {
        let c = &self.config;
        if c.max_file_size_bytes == 0 {
            return Err(ConvertError::InvalidConfig(
                "Maximum file size must be ≥ 1 byte".into(),
            ));
        }
        if c.accepted_mime_prefixes.is_empty() {
            return Err(ConvertError::InvalidConfig(
                "At least one accepted MIME prefix is required".into(),
            ));
        }
        match c.schedule {
            ProgressSchedule::Stepped { interval } if interval.is_zero() => {
                return Err(ConvertError::InvalidConfig(
                    "Step interval must be > 0".into(),
                ));
            }
            ProgressSchedule::Smooth { duration, interval }
                if interval.is_zero() || duration.is_zero() =>
            {
                return Err(ConvertError::InvalidConfig(format!(
                    "Smooth schedule needs a positive duration and interval, got {:?}/{:?}",
                    duration, interval
                )));
            }
            _ => {}
        }
        Ok(self.config)
    }
}

// ── Conversion options ───────────────────────────────────────────────────

/// The user's output choices, snapshotted when a conversion starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOptions {
    /// Output format token, used verbatim (after sanitising) as the file
    /// extension of the artifact.
    pub target_format: String,
    pub quality: Quality,
    /// Display-only size token embedded in the artifact content.
    pub target_size: String,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            target_format: "mp4".to_string(),
            quality: Quality::default(),
            target_size: "original".to_string(),
        }
    }
}

impl ConversionOptions {
    /// Create a new builder for `ConversionOptions`.
    pub fn builder() -> ConversionOptionsBuilder {
        ConversionOptionsBuilder {
            options: Self::default(),
        }
    }
}

/// Builder for [`ConversionOptions`].
#[derive(Debug)]
pub struct ConversionOptionsBuilder {
    options: ConversionOptions,
}

impl ConversionOptionsBuilder {
    pub fn target_format(mut self, format: impl Into<String>) -> Self {
        self.options.target_format = format.into();
        self
    }

    pub fn quality(mut self, quality: Quality) -> Self {
        self.options.quality = quality;
        self
    }

    pub fn target_size(mut self, size: impl Into<String>) -> Self {
        self.options.target_size = size.into();
        self
    }

    pub fn build(self) -> Result<ConversionOptions, ConvertError> {
        if self.options.target_format.trim().is_empty() {
            return Err(ConvertError::InvalidConfig(
                "Target format must not be empty".into(),
            ));
        }
        Ok(self.options)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Output quality preset. Only ever echoed into the placeholder artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    #[default]
    Medium,
    High,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Low => "low",
            Quality::Medium => "medium",
            Quality::High => "high",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quality {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Quality::Low),
            "medium" => Ok(Quality::Medium),
            "high" => Ok(Quality::High),
            other => Err(ConvertError::InvalidConfig(format!(
                "Unknown quality '{}': expected low, medium or high",
                other
            ))),
        }
    }
}
