//! Observer trait through which a presentation layer follows a session.
//!
//! Inject an [`Arc<dyn SessionObserver>`] via
//! [`crate::config::SessionConfigBuilder::observer`] to receive every state
//! change of a [`crate::session::ConversionSession`]. The session never
//! touches rendering itself; a terminal progress bar, a web socket, or a test
//! recorder all plug in here.
//!
//! # Example
//!
//! ```rust
//! use convsim::{ProgressTick, SessionConfig, SessionObserver};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct TickCounter {
//!     ticks: AtomicUsize,
//! }
//!
//! impl SessionObserver for TickCounter {
//!     fn on_progress(&self, tick: &ProgressTick) {
//!         self.ticks.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{}% {}", tick.percentage, tick.phase_label);
//!     }
//! }
//!
//! let counter = Arc::new(TickCounter { ticks: AtomicUsize::new(0) });
//!
//! let config = SessionConfig::builder()
//!     .observer(counter as Arc<dyn SessionObserver>)
//!     .build()
//!     .unwrap();
//! ```

use crate::config::ConversionOptions;
use crate::error::ValidationError;
use crate::pipeline::artifact::ConvertedArtifact;
use crate::pipeline::intake::SelectedFile;
use crate::pipeline::simulate::ProgressTick;
use std::sync::Arc;

/// Called by the session on every observable state change.
///
/// All methods have default no-op implementations so callers only override
/// what they render. Calls are made synchronously from the task that owns
/// the session, in transition order.
pub trait SessionObserver: Send + Sync {
    /// A selection was refused; the session state did not change.
    fn on_validation_rejected(&self, error: &ValidationError) {
        let _ = error;
    }

    /// A file passed validation and is now the active selection.
    fn on_file_ready(&self, file: &SelectedFile) {
        let _ = file;
    }

    /// The selection and any artifact were discarded.
    fn on_cleared(&self) {}

    /// A run began with this snapshot of the options.
    fn on_conversion_started(&self, options: &ConversionOptions) {
        let _ = options;
    }

    /// A progress tick of the current run.
    fn on_progress(&self, tick: &ProgressTick) {
        let _ = tick;
    }

    /// The run finished and its artifact is ready for download.
    fn on_conversion_completed(&self, artifact: &ConvertedArtifact) {
        let _ = artifact;
    }
}

/// A no-op implementation for callers that don't render anything.
///
/// This is the default when no observer is configured.
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// Convenience alias matching the type stored in [`crate::config::SessionConfig`].
pub type ObserverHandle = Arc<dyn SessionObserver>;
