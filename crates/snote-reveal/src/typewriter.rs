//! Incremental reveal of one line of text.
//!
//! States: `Idle → Revealing → Idle`. A reveal emits the skipped prefix
//! atomically, then one character per [`Typewriter::tick`], then exactly one
//! [`RevealEvent::Completed`]. [`Typewriter::cancel`] flushes whatever is left
//! and completes; cancelling an idle typewriter does nothing.

use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealEvent {
    /// Text to add to the display
    Append(String),
    /// The current reveal is finished; emitted once per reveal
    Completed,
}

#[derive(Debug, Default)]
enum State {
    #[default]
    Idle,
    Revealing {
        pending: VecDeque<char>,
    },
}

#[derive(Debug, Default)]
pub struct Typewriter {
    state: State,
}

impl Typewriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_revealing(&self) -> bool {
        matches!(self.state, State::Revealing { .. })
    }

    /// Begin revealing `text`; the first `skip` characters appear at once.
    ///
    /// Starting while a reveal is in flight cancels that reveal first, so its
    /// flush and completion precede the new text.
    pub fn start(&mut self, text: &str, skip: usize) -> Vec<RevealEvent> {
        let mut events = self.cancel();

        if text.is_empty() {
            events.push(RevealEvent::Completed);
            return events;
        }

        let split = text
            .char_indices()
            .nth(skip)
            .map(|(idx, _)| idx)
            .unwrap_or(text.len());
        let (instant, animated) = text.split_at(split);

        if !instant.is_empty() {
            events.push(RevealEvent::Append(instant.to_string()));
        }
        if animated.is_empty() {
            events.push(RevealEvent::Completed);
        } else {
            self.state = State::Revealing {
                pending: animated.chars().collect(),
            };
        }
        events
    }

    /// Reveal the next character.
    pub fn tick(&mut self) -> Vec<RevealEvent> {
        let State::Revealing { pending } = &mut self.state else {
            return Vec::new();
        };

        let mut events = Vec::with_capacity(2);
        if let Some(c) = pending.pop_front() {
            events.push(RevealEvent::Append(c.to_string()));
        }
        if pending.is_empty() {
            self.state = State::Idle;
            events.push(RevealEvent::Completed);
        }
        events
    }

    /// Flush the rest of the current reveal at once.
    pub fn cancel(&mut self) -> Vec<RevealEvent> {
        match std::mem::take(&mut self.state) {
            State::Idle => Vec::new(),
            State::Revealing { pending } => {
                let mut events = Vec::with_capacity(2);
                if !pending.is_empty() {
                    events.push(RevealEvent::Append(pending.into_iter().collect()));
                }
                events.push(RevealEvent::Completed);
                events
            }
        }
    }
}
