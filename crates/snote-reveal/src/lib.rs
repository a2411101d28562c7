//! snote-reveal: ordered, one-at-a-time display of progress reports
//!
//! ```text
//! ProgressReport ─► ReportQueue ─► Typewriter ─► RevealSurface
//!                    (FIFO, one      (timestamp     (terminal,
//!                     active)         instant,       transcript)
//!                                     message
//!                                     char-by-char)
//! ```
//!
//! [`Typewriter`] and [`ReportQueue`] are plain state machines driven by
//! explicit `tick()` calls. [`RevealDriver`] runs them on a tokio interval,
//! so tests can step them with a paused clock.

pub mod driver;
pub mod queue;
pub mod typewriter;

pub use driver::{
    channel, RevealCommand, RevealDriver, RevealHandle, RevealSurface, Revealed,
    TranscriptSurface,
};
pub use queue::{QueueError, QueueState, ReportQueue};
pub use typewriter::{RevealEvent, Typewriter};
