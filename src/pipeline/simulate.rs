//! Simulated conversion progress.
//!
//! Nothing is converted. A [`ProgressSimulator`] replays a scripted sequence
//! of [`ProgressTick`]s over wall-clock time and then signals completion.
//! The sequence itself comes from a [`ProgressSchedule`], which is a pure
//! value: `schedule.ticks()` can be inspected without any runtime.
//!
//! ## Guarantees
//!
//! For every schedule the tick sequence is finite, non-decreasing, and ends
//! with exactly one 100% tick. `on_complete` runs exactly once, right after
//! that tick, unless the run was cancelled first. After
//! [`SimulationHandle::cancel`] neither callback runs again.

use crate::error::ConvertError;
use crate::stream::tick_stream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Reference interval between discrete steps.
pub const DEFAULT_STEP_INTERVAL: Duration = Duration::from_millis(800);

/// Reference total duration of the smooth schedule.
pub const DEFAULT_SMOOTH_DURATION: Duration = Duration::from_millis(3000);

/// Reference update interval of the smooth schedule.
pub const DEFAULT_SMOOTH_INTERVAL: Duration = Duration::from_millis(50);

/// Discrete steps of the stepped schedule.
const STEPS: [(u8, Phase); 6] = [
    (10, Phase::Reading),
    (30, Phase::Processing),
    (60, Phase::Converting),
    (80, Phase::Optimizing),
    (95, Phase::Finalizing),
    (100, Phase::Complete),
];

/// Named pretend stage of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Reading,
    Analyzing,
    Processing,
    Converting,
    Optimizing,
    Finalizing,
    Complete,
}

impl Phase {
    /// Default English label. Presentation layers are free to ignore it.
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Reading => "Reading file…",
            Phase::Analyzing => "Analyzing file…",
            Phase::Processing => "Processing…",
            Phase::Converting => "Converting file format…",
            Phase::Optimizing => "Optimizing quality…",
            Phase::Finalizing => "Finalizing conversion…",
            Phase::Complete => "Conversion complete!",
        }
    }

    /// Phase shown by the smooth schedule at a given percentage.
    fn for_percentage(percentage: u8) -> Self {
        match percentage {
            100.. => Phase::Complete,
            0..30 => Phase::Analyzing,
            30..60 => Phase::Converting,
            60..90 => Phase::Optimizing,
            _ => Phase::Finalizing,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One progress update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressTick {
    /// 0–100.
    pub percentage: u8,
    pub phase: Phase,
    pub phase_label: String,
}

impl ProgressTick {
    pub fn new(percentage: u8, phase: Phase) -> Self {
        Self {
            percentage: percentage.min(100),
            phase,
            phase_label: phase.label().to_string(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.percentage == 100
    }
}

/// How a run paces its ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressSchedule {
    /// Six named steps (10, 30, 60, 80, 95, 100), one per `interval`.
    Stepped { interval: Duration },
    /// Linear 0→100 over `duration`, one tick per `interval`.
    Smooth { duration: Duration, interval: Duration },
}

impl Default for ProgressSchedule {
    fn default() -> Self {
        ProgressSchedule::Stepped {
            interval: DEFAULT_STEP_INTERVAL,
        }
    }
}

impl ProgressSchedule {
    /// The smooth schedule with its reference timings (3 s, 50 ms updates).
    pub fn smooth() -> Self {
        ProgressSchedule::Smooth {
            duration: DEFAULT_SMOOTH_DURATION,
            interval: DEFAULT_SMOOTH_INTERVAL,
        }
    }

    /// Delay before each tick.
    pub fn interval(&self) -> Duration {
        match self {
            ProgressSchedule::Stepped { interval } => *interval,
            ProgressSchedule::Smooth { interval, .. } => *interval,
        }
    }

    /// Total time from start to the 100% tick, saturating at `Duration::MAX`.
    pub fn total_duration(&self) -> Duration {
        u32::try_from(self.ticks().len())
            .ok()
            .and_then(|n| self.interval().checked_mul(n))
            .unwrap_or(Duration::MAX)
    }

    /// The full tick sequence of one run.
    pub fn ticks(&self) -> Vec<ProgressTick> {
        match self {
            ProgressSchedule::Stepped { .. } => STEPS
                .iter()
                .map(|&(pct, phase)| ProgressTick::new(pct, phase))
                .collect(),
            ProgressSchedule::Smooth { duration, interval } => {
                let steps = smooth_steps(*duration, *interval);
                (1..=steps)
                    .map(|i| {
                        // Round half up; only the final step may reach 100.
                        let pct = if i == steps {
                            100
                        } else {
                            ((i * 100 + steps / 2) / steps).min(99)
                        };
                        let pct = pct as u8;
                        ProgressTick::new(pct, Phase::for_percentage(pct))
                    })
                    .collect()
            }
        }
    }
}

fn smooth_steps(duration: Duration, interval: Duration) -> u64 {
    if interval.is_zero() {
        return 1;
    }
    u64::try_from(duration.as_nanos() / interval.as_nanos())
        .unwrap_or(u64::MAX)
        .max(1)
}

/// Drives one simulated run.
#[derive(Debug, Clone, Copy)]
pub struct ProgressSimulator {
    schedule: ProgressSchedule,
}

impl ProgressSimulator {
    pub fn new(schedule: ProgressSchedule) -> Self {
        Self { schedule }
    }

    pub fn schedule(&self) -> ProgressSchedule {
        self.schedule
    }

    /// Start the run on the current Tokio runtime.
    ///
    /// `on_tick` receives every tick in order; `on_complete` runs once right
    /// after the 100% tick. Both run on the spawned task, so they should only
    /// hand the event off (e.g. send it over a channel).
    pub fn run<T, C>(&self, mut on_tick: T, on_complete: C) -> Result<SimulationHandle, ConvertError>
    where
        T: FnMut(ProgressTick) + Send + 'static,
        C: FnOnce() + Send + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ConvertError::Internal(format!("progress simulator needs a Tokio runtime: {e}")))?;

        let token = CancellationToken::new();
        let task_token = token.clone();
        let mut ticks = tick_stream(self.schedule, token.clone());

        let task = runtime.spawn(async move {
            let mut reached_end = false;
            while let Some(tick) = ticks.next().await {
                if task_token.is_cancelled() {
                    return;
                }
                let terminal = tick.is_terminal();
                on_tick(tick);
                if terminal {
                    reached_end = true;
                    break;
                }
            }

            if reached_end && !task_token.is_cancelled() {
                on_complete();
            } else {
                debug!("Simulated run cancelled before completion");
            }
        });

        Ok(SimulationHandle { token, task })
    }
}

/// Cancellation handle of a running simulation. Dropping it cancels the run.
#[derive(Debug)]
pub struct SimulationHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl SimulationHandle {
    /// Stop the run. No tick or completion is delivered afterwards.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// True once the task has exited, whether it completed or was cancelled.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for SimulationHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
