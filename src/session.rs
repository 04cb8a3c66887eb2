//! The conversion session: one file, one state machine, one source of truth.
//!
//! ## States
//!
//! ```text
//!            select_file             start_conversion          100% + complete
//!   Empty ───────────────▶ FileSelected ─────────────▶ Converting ───────────────▶ Completed
//!     ▲                        │  ▲                        │                          │  │
//!     │        remove_file     │  └── select_file ─────────┼──────────────────────────┘  │
//!     └────────────────────────┴───────────────────────────┘◀── start_conversion ────────┘
//! ```
//!
//! `remove_file` returns to `Empty` from every other state and cancels an
//! in-flight run. There is no way back from `Converting` to `FileSelected`.
//!
//! ## Event pump
//!
//! The session is owned by one task and mutated only through `&mut self`.
//! The simulator runs on its own task and merely sends tagged events over a
//! channel; [`ConversionSession::next_event`] receives one, drops it if it
//! belongs to an older run, and applies it through
//! [`ConversionSession::on_progress_tick`] or
//! [`ConversionSession::on_progress_complete`]. Observer callbacks therefore
//! always run on the owning task, in transition order.
//!
//! Dropping the session cancels any run and releases any artifact handle.

use crate::config::{ConversionOptions, SessionConfig};
use crate::error::{ConvertError, ValidationError};
use crate::observer::{NoopObserver, ObserverHandle};
use crate::pipeline::artifact::{ArtifactFactory, ArtifactLease, ArtifactRegistry, ConvertedArtifact};
use crate::pipeline::intake::{validate, SelectedFile};
use crate::pipeline::simulate::{ProgressSimulator, ProgressTick, SimulationHandle};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionState {
    Empty,
    FileSelected,
    Converting,
    Completed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Empty => "empty",
            SessionState::FileSelected => "file-selected",
            SessionState::Converting => "converting",
            SessionState::Completed => "completed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of [`ConversionSession::select_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectOutcome {
    Accepted,
    /// State unchanged; the observer was told why.
    Rejected(ValidationError),
}

impl SelectOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SelectOutcome::Accepted)
    }
}

/// Result of [`ConversionSession::start_conversion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started { run_id: u64 },
    /// A run was already in flight; nothing happened.
    AlreadyConverting,
}

/// An event applied by [`ConversionSession::next_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Progress(ProgressTick),
    Completed,
}

/// Serialisable view of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub file: Option<SelectedFile>,
    pub options: Option<ConversionOptions>,
    /// Last percentage of the current run; 100 once completed.
    pub progress: Option<u8>,
    pub artifact: Option<ArtifactSummary>,
}

/// Artifact details without the content bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactSummary {
    pub suggested_file_name: String,
    pub size_bytes: usize,
    pub mime_type: &'static str,
}

#[derive(Debug)]
enum SimEvent {
    Tick(u64, ProgressTick),
    Complete(u64),
}

struct ActiveRun {
    id: u64,
    handle: SimulationHandle,
    last_percentage: Option<u8>,
    terminal_seen: bool,
}

struct StoredArtifact {
    artifact: ConvertedArtifact,
    _lease: ArtifactLease,
}

/// The conversion state machine.
///
/// # Example
/// ```rust,no_run
/// use convsim::{ConversionOptions, ConversionSession, SelectedFile, SessionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut session = ConversionSession::new(SessionConfig::default());
/// session.select_file(Some(SelectedFile::new("video.mp4", 1024, "video/mp4")))?;
///
/// let options = ConversionOptions::builder().target_format("gif").build()?;
/// session.start_conversion(&options)?;
/// session.run_until_settled().await?;
///
/// let artifact = session.artifact().expect("completed");
/// assert_eq!(artifact.suggested_file_name, "video_converted.gif");
/// # Ok(())
/// # }
/// ```
pub struct ConversionSession {
    config: SessionConfig,
    observer: ObserverHandle,
    factory: ArtifactFactory,
    registry: ArtifactRegistry,
    state: SessionState,
    file: Option<SelectedFile>,
    options: Option<ConversionOptions>,
    artifact: Option<StoredArtifact>,
    run: Option<ActiveRun>,
    next_run_id: u64,
    events_tx: mpsc::UnboundedSender<SimEvent>,
    events_rx: mpsc::UnboundedReceiver<SimEvent>,
}

impl fmt::Debug for ConversionSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionSession")
            .field("state", &self.state)
            .field("file", &self.file)
            .field("options", &self.options)
            .field("run_id", &self.run.as_ref().map(|r| r.id))
            .field("has_artifact", &self.artifact.is_some())
            .finish()
    }
}

impl ConversionSession {
    pub fn new(config: SessionConfig) -> Self {
        Self::with_registry(config, ArtifactRegistry::new())
    }

    /// Create a session that issues artifact handles from `registry`.
    pub fn with_registry(config: SessionConfig, registry: ArtifactRegistry) -> Self {
        let observer = config
            .observer
            .clone()
            .unwrap_or_else(|| Arc::new(NoopObserver) as ObserverHandle);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Self {
            config,
            observer,
            factory: ArtifactFactory::new(),
            registry,
            state: SessionState::Empty,
            file: None,
            options: None,
            artifact: None,
            run: None,
            next_run_id: 0,
            events_tx,
            events_rx,
        }
    }

    // ── Transitions ──────────────────────────────────────────────────────

    /// Select (or replace) the file. Not allowed while converting.
    pub fn select_file(&mut self, file: Option<SelectedFile>) -> Result<SelectOutcome, ConvertError> {
        if self.state == SessionState::Converting {
            return Err(self.invalid("select_file"));
        }

        let file = match file {
            Some(f) => f,
            None => return Ok(self.reject(ValidationError::NoFile)),
        };
        if let Err(e) = validate(Some(&file), &self.config) {
            return Ok(self.reject(e));
        }

        self.release_artifact();
        self.options = None;
        info!(
            "Selected '{}' ({}, mime '{}')",
            file.name,
            file.display_size(),
            file.mime_type
        );
        self.observer.on_file_ready(&file);
        self.file = Some(file);
        self.state = SessionState::FileSelected;
        Ok(SelectOutcome::Accepted)
    }

    /// Drop the selection, cancel any run, release any artifact.
    pub fn remove_file(&mut self) -> Result<(), ConvertError> {
        if self.state == SessionState::Empty {
            return Err(self.invalid("remove_file"));
        }

        if let Some(run) = self.run.take() {
            run.handle.cancel();
            info!("Cancelled run #{} at {:?}%", run.id, run.last_percentage);
        }
        self.release_artifact();
        self.file = None;
        self.options = None;
        self.state = SessionState::Empty;
        info!("Session cleared");
        self.observer.on_cleared();
        Ok(())
    }

    /// Start a simulated run with a snapshot of `options`.
    ///
    /// Must be called from within a Tokio runtime. A call while a run is in
    /// flight is ignored and returns [`StartOutcome::AlreadyConverting`].
    pub fn start_conversion(&mut self, options: &ConversionOptions) -> Result<StartOutcome, ConvertError> {
        match self.state {
            SessionState::Converting => {
                debug!("start_conversion ignored: run already in flight");
                return Ok(StartOutcome::AlreadyConverting);
            }
            SessionState::Empty => {
                warn!("start_conversion called with no file selected");
                return Err(ConvertError::NoFileSelected);
            }
            SessionState::FileSelected | SessionState::Completed => {}
        }

        let run_id = self.next_run_id + 1;
        let tick_tx = self.events_tx.clone();
        let done_tx = self.events_tx.clone();
        let handle = ProgressSimulator::new(self.config.schedule).run(
            move |tick| {
                let _ = tick_tx.send(SimEvent::Tick(run_id, tick));
            },
            move || {
                let _ = done_tx.send(SimEvent::Complete(run_id));
            },
        )?;

        self.next_run_id = run_id;
        self.release_artifact();
        let options = options.clone();
        info!(
            "Starting run #{}: format={}, quality={}, size={}",
            run_id, options.target_format, options.quality, options.target_size
        );
        self.observer.on_conversion_started(&options);
        self.options = Some(options);
        self.run = Some(ActiveRun {
            id: run_id,
            handle,
            last_percentage: None,
            terminal_seen: false,
        });
        self.state = SessionState::Converting;
        Ok(StartOutcome::Started { run_id })
    }

    /// Apply one tick of the current run and forward it to the observer.
    pub fn on_progress_tick(&mut self, tick: ProgressTick) -> Result<(), ConvertError> {
        if self.state != SessionState::Converting {
            return Err(self.invalid("on_progress_tick"));
        }
        let run = self
            .run
            .as_mut()
            .ok_or_else(|| ConvertError::Internal("converting without an active run".into()))?;

        if run.terminal_seen {
            warn!("Run #{}: tick {}% after the terminal tick", run.id, tick.percentage);
            return Err(ConvertError::OutOfOrderCompletion);
        }
        if let Some(last) = run.last_percentage {
            if tick.percentage < last {
                warn!("Run #{}: progress regressed {}% → {}%", run.id, last, tick.percentage);
                return Err(ConvertError::ProgressRegressed {
                    last,
                    got: tick.percentage,
                });
            }
        }

        run.last_percentage = Some(tick.percentage);
        run.terminal_seen = tick.is_terminal();
        debug!("Run #{}: {}% {}", run.id, tick.percentage, tick.phase_label);
        self.observer.on_progress(&tick);
        Ok(())
    }

    /// Finish the current run: produce and store the artifact.
    pub fn on_progress_complete(&mut self) -> Result<(), ConvertError> {
        if self.state != SessionState::Converting {
            return Err(self.invalid("on_progress_complete"));
        }
        match self.run {
            Some(ref run) if run.terminal_seen => {}
            _ => {
                warn!("Completion signalled before the terminal tick");
                return Err(ConvertError::OutOfOrderCompletion);
            }
        }

        let (file, options) = match (&self.file, &self.options) {
            (Some(f), Some(o)) => (f, o),
            _ => {
                return Err(ConvertError::Internal(
                    "converting without a file or options snapshot".into(),
                ))
            }
        };

        let artifact = self.factory.produce(file, options);
        let lease = self.registry.issue(&artifact);
        let run_id = self.run.take().map(|r| r.id).unwrap_or_default();
        info!(
            "Run #{} complete: '{}' ({} bytes)",
            run_id,
            artifact.suggested_file_name,
            artifact.len()
        );

        self.state = SessionState::Completed;
        self.observer.on_conversion_completed(&artifact);
        self.artifact = Some(StoredArtifact {
            artifact,
            _lease: lease,
        });
        Ok(())
    }

    // ── Event pump ───────────────────────────────────────────────────────

    /// Wait for and apply the next event of the current run.
    ///
    /// Returns `Ok(None)` immediately when no run is in flight. Events of
    /// cancelled or superseded runs are discarded.
    pub async fn next_event(&mut self) -> Result<Option<SessionEvent>, ConvertError> {
        loop {
            if self.state != SessionState::Converting {
                return Ok(None);
            }

            let event = self
                .events_rx
                .recv()
                .await
                .ok_or_else(|| ConvertError::Internal("simulator event channel closed".into()))?;

            let current = self.run.as_ref().map(|r| r.id);
            match event {
                SimEvent::Tick(id, tick) if Some(id) == current => {
                    self.on_progress_tick(tick.clone())?;
                    return Ok(Some(SessionEvent::Progress(tick)));
                }
                SimEvent::Complete(id) if Some(id) == current => {
                    self.on_progress_complete()?;
                    return Ok(Some(SessionEvent::Completed));
                }
                stale => debug!("Dropping stale simulator event {:?}", stale),
            }
        }
    }

    /// Pump events until no run is in flight; returns the resulting state.
    pub async fn run_until_settled(&mut self) -> Result<SessionState, ConvertError> {
        while self.next_event().await?.is_some() {}
        Ok(self.state)
    }

    // ── Accessors ────────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn selected_file(&self) -> Option<&SelectedFile> {
        self.file.as_ref()
    }

    /// Options snapshot of the current or last run.
    pub fn options(&self) -> Option<&ConversionOptions> {
        self.options.as_ref()
    }

    pub fn artifact(&self) -> Option<&ConvertedArtifact> {
        self.artifact.as_ref().map(|s| &s.artifact)
    }

    pub fn current_run_id(&self) -> Option<u64> {
        self.run.as_ref().map(|r| r.id)
    }

    pub fn registry(&self) -> &ArtifactRegistry {
        &self.registry
    }

    /// Artifact handles issued by this session's registry and not released.
    pub fn live_artifacts(&self) -> usize {
        self.registry.live()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let progress = match self.state {
            SessionState::Converting => self.run.as_ref().and_then(|r| r.last_percentage),
            SessionState::Completed => Some(100),
            _ => None,
        };

        SessionSnapshot {
            state: self.state,
            file: self.file.clone(),
            options: self.options.clone(),
            progress,
            artifact: self.artifact().map(|a| ArtifactSummary {
                suggested_file_name: a.suggested_file_name.clone(),
                size_bytes: a.len(),
                mime_type: a.mime_type,
            }),
        }
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    fn reject(&self, error: ValidationError) -> SelectOutcome {
        info!("Selection rejected ({}): {}", error.reason(), error);
        self.observer.on_validation_rejected(&error);
        SelectOutcome::Rejected(error)
    }

    fn release_artifact(&mut self) {
        if let Some(stored) = self.artifact.take() {
            debug!("Discarding artifact '{}'", stored.artifact.suggested_file_name);
        }
    }

    fn invalid(&self, operation: &'static str) -> ConvertError {
        warn!("'{}' called while {}", operation, self.state);
        ConvertError::InvalidTransition {
            operation,
            state: self.state,
        }
    }
}
