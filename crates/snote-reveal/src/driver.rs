//! Async driver: feeds reports into a [`ReportQueue`] and ticks it on a tokio
//! interval, writing every reveal event to a [`RevealSurface`].
//!
//! The loop ends when every [`RevealHandle`] is dropped and the queue has
//! drained, or immediately when its cancellation token fires.

use std::time::Duration;

use snote_core::ProgressReport;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::queue::ReportQueue;
use crate::typewriter::RevealEvent;

/// Fallback speed when a non-positive or non-finite rate is supplied.
const DEFAULT_CHARS_PER_SECOND: f64 = 50.0;

/// Where revealed text ends up (terminal, test buffer, ...).
pub trait RevealSurface: Send {
    fn append(&mut self, text: &str);

    /// One report finished revealing.
    fn completed(&mut self) {}
}

impl<T: RevealSurface + ?Sized> RevealSurface for Box<T> {
    fn append(&mut self, text: &str) {
        (**self).append(text);
    }

    fn completed(&mut self) {
        (**self).completed();
    }
}

/// In-memory surface.
#[derive(Debug, Default, Clone)]
pub struct TranscriptSurface {
    pub text: String,
    pub completions: usize,
}

impl RevealSurface for TranscriptSurface {
    fn append(&mut self, text: &str) {
        self.text.push_str(text);
    }

    fn completed(&mut self) {
        self.completions += 1;
    }
}

#[derive(Debug)]
pub enum RevealCommand {
    Report(ProgressReport),
    /// Flush the report currently typing
    Skip,
    /// Resolved once nothing is queued or typing
    WhenIdle(oneshot::Sender<()>),
}

/// Cloneable sending side of a [`RevealDriver`].
#[derive(Debug, Clone)]
pub struct RevealHandle {
    tx: mpsc::UnboundedSender<RevealCommand>,
}

impl RevealHandle {
    /// Queue a report; false once the driver has stopped.
    pub fn report(&self, report: ProgressReport) -> bool {
        self.tx.send(RevealCommand::Report(report)).is_ok()
    }

    pub fn skip(&self) -> bool {
        self.tx.send(RevealCommand::Skip).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Wait until every report sent so far has been revealed.
    ///
    /// False when the driver stopped first.
    pub async fn wait_idle(&self) -> bool {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(RevealCommand::WhenIdle(tx)).is_err() {
            return false;
        }
        rx.await.is_ok()
    }
}

/// What a finished driver hands back.
#[derive(Debug)]
pub struct Revealed<S> {
    pub surface: S,
    pub transcript: String,
}

pub struct RevealDriver<S> {
    queue: ReportQueue,
    commands: mpsc::UnboundedReceiver<RevealCommand>,
    surface: S,
    period: Duration,
    cancel: CancellationToken,
    idle_waiters: Vec<oneshot::Sender<()>>,
}

/// Create a driver writing to `surface` at `chars_per_second`, plus its handle.
pub fn channel<S: RevealSurface>(surface: S, chars_per_second: f64) -> (RevealHandle, RevealDriver<S>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let driver = RevealDriver {
        queue: ReportQueue::new(),
        commands: rx,
        surface,
        period: tick_period(chars_per_second),
        cancel: CancellationToken::new(),
        idle_waiters: Vec::new(),
    };
    (RevealHandle { tx }, driver)
}

fn tick_period(chars_per_second: f64) -> Duration {
    let rate = if chars_per_second.is_finite() && chars_per_second > 0.0 {
        chars_per_second
    } else {
        DEFAULT_CHARS_PER_SECOND
    };
    Duration::from_nanos((1e9 / rate).round() as u64).max(Duration::from_micros(1))
}

impl<S: RevealSurface> RevealDriver<S> {
    /// Stop on `token` instead of the driver's own token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub async fn run(mut self) -> Revealed<S> {
        let mut ticker = time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut open = true;

        tracing::debug!(period_us = self.period.as_micros() as u64, "reveal driver started");

        loop {
            let revealing = self.queue.is_revealing();
            if !open && !revealing {
                break;
            }

            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    tracing::debug!(pending = self.queue.len(), "reveal driver cancelled");
                    break;
                }

                command = self.commands.recv(), if open => match command {
                    Some(RevealCommand::Report(report)) => {
                        let events = self.queue.enqueue(report);
                        self.emit(events);
                    }
                    Some(RevealCommand::Skip) => {
                        let events = self.queue.skip();
                        self.emit(events);
                    }
                    Some(RevealCommand::WhenIdle(waiter)) => self.idle_waiters.push(waiter),
                    None => open = false,
                },

                _ = ticker.tick(), if revealing => {
                    let events = self.queue.tick();
                    self.emit(events);
                }
            }

            self.settle();
        }

        tracing::debug!(chars = self.queue.transcript().chars().count(), "reveal driver stopped");
        Revealed {
            transcript: self.queue.transcript().to_string(),
            surface: self.surface,
        }
    }

    /// Move past every finished report and wake idle waiters.
    fn settle(&mut self) {
        while self.queue.awaiting_advance() {
            match self.queue.advance() {
                Ok(events) => self.emit(events),
                Err(_) => break,
            }
        }
        if self.queue.is_idle() {
            for waiter in self.idle_waiters.drain(..) {
                let _ = waiter.send(());
            }
        }
    }

    fn emit(&mut self, events: Vec<RevealEvent>) {
        for event in events {
            match event {
                RevealEvent::Append(text) => self.surface.append(&text),
                RevealEvent::Completed => self.surface.completed(),
            }
        }
    }
}
