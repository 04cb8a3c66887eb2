//! # convsim
//!
//! File intake and a simulated conversion pipeline, driven by a single
//! state machine.
//!
//! ## Why this crate?
//!
//! A "convert your file" front end needs the same plumbing whether or not a
//! real converter sits behind it: validate what the user picked, remember
//! the chosen options, show progress, hand back a result, and clean up when
//! the user changes their mind mid-run. This crate provides that plumbing
//! with a scripted progress run standing in for the converter, so the whole
//! flow can be driven and tested end to end.
//!
//! ## Flow Overview
//!
//! ```text
//! file metadata
//!  │
//!  ├─ 1. Intake    size / MIME-family validation
//!  ├─ 2. Session   Empty → FileSelected → Converting → Completed
//!  ├─ 3. Simulate  timed progress ticks on a cancellable task
//!  ├─ 4. Artifact  placeholder output + suggested download name
//!  └─ 5. Observer  presentation callbacks (CLI bar, UI, tests)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use convsim::{ConversionOptions, ConversionSession, Quality, SelectedFile, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut session = ConversionSession::new(SessionConfig::default());
//!
//!     let file = SelectedFile::from_path("holiday.mov").await?;
//!     if !session.select_file(Some(file))?.is_accepted() {
//!         return Ok(());
//!     }
//!
//!     let options = ConversionOptions::builder()
//!         .target_format("mp4")
//!         .quality(Quality::High)
//!         .build()?;
//!     session.start_conversion(&options)?;
//!     session.run_until_settled().await?;
//!
//!     if let Some(artifact) = session.artifact() {
//!         let path = convsim::write_artifact(artifact, ".").await?;
//!         eprintln!("saved {}", path.display());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `convsim` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! convsim = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod observer;
pub mod pipeline;
pub mod session;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionOptions, ConversionOptionsBuilder, Quality, SessionConfig, SessionConfigBuilder};
pub use error::{ConvertError, ValidationError};
pub use observer::{NoopObserver, ObserverHandle, SessionObserver};
pub use pipeline::artifact::{
    suggested_file_name, write_artifact, ArtifactFactory, ArtifactLease, ArtifactRegistry, ConvertedArtifact,
};
pub use pipeline::intake::{format_file_size, validate, validate_default, SelectedFile};
pub use pipeline::simulate::{Phase, ProgressSchedule, ProgressSimulator, ProgressTick, SimulationHandle};
pub use session::{
    ArtifactSummary, ConversionSession, SelectOutcome, SessionEvent, SessionSnapshot, SessionState, StartOutcome,
};
pub use stream::{tick_stream, TickStream};
