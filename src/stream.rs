//! Streaming view of a progress schedule: ticks arrive as time passes.
//!
//! [`tick_stream`] turns a [`ProgressSchedule`] into a `Stream` that yields
//! each tick one interval after the previous. The stream ends after the 100%
//! tick, or early as soon as the supplied token is cancelled; a tick whose
//! delay was interrupted by cancellation is never yielded.
//!
//! The [`crate::pipeline::simulate::ProgressSimulator`] consumes this stream
//! on a spawned task. Callers that prefer pulling ticks themselves (e.g. to
//! render a standalone progress bar) can use it directly.

use crate::pipeline::simulate::{ProgressSchedule, ProgressTick};
use futures::future;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use tokio::time::sleep;
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;

/// A boxed stream of progress ticks.
pub type TickStream = Pin<Box<dyn Stream<Item = ProgressTick> + Send>>;

/// Yield the ticks of `schedule` in real time until done or cancelled.
///
/// # Example
/// ```rust
/// use convsim::{tick_stream, ProgressSchedule};
/// use futures::StreamExt;
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main]
/// # async fn main() {
/// let schedule = ProgressSchedule::Stepped { interval: Duration::from_millis(1) };
/// let pcts: Vec<u8> = tick_stream(schedule, CancellationToken::new())
///     .map(|t| t.percentage)
///     .collect()
///     .await;
/// assert_eq!(pcts.last(), Some(&100));
/// # }
/// ```
pub fn tick_stream(schedule: ProgressSchedule, cancel: CancellationToken) -> TickStream {
    let interval = schedule.interval();

    let s = stream::iter(schedule.ticks())
        .then(move |tick| {
            let cancel = cancel.clone();
            async move {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    _ = sleep(interval) => Some(tick),
                }
            }
        })
        .take_while(|tick| future::ready(tick.is_some()))
        .filter_map(future::ready);

    Box::pin(s)
}
