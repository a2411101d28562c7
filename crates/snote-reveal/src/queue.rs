//! FIFO of progress reports with at most one report on screen at a time.
//!
//! ```text
//!  enqueue ─► pending ─► Idle ──activate──► Revealing{done: false}
//!                         ▲                      │ tick / skip
//!                         │                      ▼
//!                         └──advance──── Revealing{done: true}
//! ```
//!
//! `advance` is refused while the active report is still typing; the
//! typewriter's completion (or a skip) is what makes it legal.

use std::collections::VecDeque;

use snote_core::{ProgressReport, TIMESTAMP_WIDTH};
use thiserror::Error;

use crate::typewriter::{RevealEvent, Typewriter};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("report is still being revealed")]
    RevealInProgress,
}

#[derive(Debug, Default)]
pub enum QueueState {
    #[default]
    Idle,
    Revealing {
        report: ProgressReport,
        /// Typewriter signalled completion for `report`
        done: bool,
    },
}

#[derive(Debug, Default)]
pub struct ReportQueue {
    pending: VecDeque<ProgressReport>,
    state: QueueState,
    typewriter: Typewriter,
    transcript: String,
    lines: usize,
}

impl ReportQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a report; it becomes active immediately when nothing else is.
    pub fn enqueue(&mut self, report: ProgressReport) -> Vec<RevealEvent> {
        self.pending.push_back(report);
        match self.state {
            QueueState::Idle => self.activate_next(),
            QueueState::Revealing { .. } => Vec::new(),
        }
    }

    /// Discard the finished active report and start the next one.
    pub fn advance(&mut self) -> Result<Vec<RevealEvent>, QueueError> {
        match &self.state {
            QueueState::Revealing { done: false, .. } => Err(QueueError::RevealInProgress),
            QueueState::Revealing { done: true, .. } | QueueState::Idle => {
                self.state = QueueState::Idle;
                Ok(self.activate_next())
            }
        }
    }

    /// Reveal one more character of the active report.
    pub fn tick(&mut self) -> Vec<RevealEvent> {
        let events = self.typewriter.tick();
        self.record(events)
    }

    /// Finish the active report at once.
    pub fn skip(&mut self) -> Vec<RevealEvent> {
        let events = self.typewriter.cancel();
        self.record(events)
    }

    pub fn state(&self) -> &QueueState {
        &self.state
    }

    pub fn active(&self) -> Option<&ProgressReport> {
        match &self.state {
            QueueState::Revealing { report, .. } => Some(report),
            QueueState::Idle => None,
        }
    }

    /// The active report is still typing.
    pub fn is_revealing(&self) -> bool {
        matches!(self.state, QueueState::Revealing { done: false, .. })
    }

    /// The active report finished and `advance` may run.
    pub fn awaiting_advance(&self) -> bool {
        matches!(self.state, QueueState::Revealing { done: true, .. })
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, QueueState::Idle) && self.pending.is_empty()
    }

    /// Reports waiting behind the active one.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Everything revealed so far, in order.
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    fn activate_next(&mut self) -> Vec<RevealEvent> {
        let Some(report) = self.pending.pop_front() else {
            return Vec::new();
        };

        let mut line = report.line();
        let mut skip = TIMESTAMP_WIDTH;
        if self.lines > 0 {
            line.insert(0, '\n');
            skip += 1;
        }
        self.lines += 1;

        tracing::trace!(timestamp = %report.timestamp(), "revealing report");
        self.state = QueueState::Revealing {
            report,
            done: false,
        };
        let events = self.typewriter.start(&line, skip);
        self.record(events)
    }

    fn record(&mut self, events: Vec<RevealEvent>) -> Vec<RevealEvent> {
        for event in &events {
            match event {
                RevealEvent::Append(text) => self.transcript.push_str(text),
                RevealEvent::Completed => {
                    if let QueueState::Revealing { done, .. } = &mut self.state {
                        *done = true;
                    }
                }
            }
        }
        events
    }
}
