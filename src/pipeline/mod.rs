//! Pipeline stages behind a conversion session.
//!
//! Each submodule implements one step and knows nothing about session
//! state; [`crate::session`] sequences them.
//!
//! ## Data Flow
//!
//! ```text
//! intake ──▶ simulate ──▶ artifact
//! (validate)  (ticks)     (placeholder + name)
//! ```
//!
//! 1. [`intake`]: capture file metadata and validate it against the
//!    session's size limit and accepted MIME families
//! 2. [`simulate`]: replay a progress schedule on a cancellable Tokio task
//! 3. [`artifact`]: build the placeholder output, track its handle, and
//!    write it to disk on request

pub mod artifact;
pub mod intake;
pub mod simulate;
