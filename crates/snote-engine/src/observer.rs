//! Listeners for coordinator output.
//!
//! Any number of observers can subscribe; each receives every report in
//! emission order and the decrypted text of successful `process` calls.
//! Observers are invoked outside the registry lock, so an observer may
//! subscribe or unsubscribe from inside a callback.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use snote_core::ProgressReport;
use snote_reveal::RevealHandle;
use tokio::sync::mpsc;

pub trait CoordinatorObserver: Send + Sync {
    fn on_report(&self, report: &ProgressReport);

    fn on_decrypted(&self, _text: &str) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Entry = (SubscriptionId, Arc<dyn CoordinatorObserver>);

#[derive(Default)]
pub struct ObserverRegistry {
    next_id: AtomicU64,
    entries: Mutex<Vec<Entry>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: Arc<dyn CoordinatorObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, observer));
        id
    }

    /// Returns false when `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn report(&self, report: &ProgressReport) {
        for observer in self.snapshot() {
            observer.on_report(report);
        }
    }

    pub fn decrypted(&self, text: &str) {
        for observer in self.snapshot() {
            observer.on_decrypted(text);
        }
    }

    fn snapshot(&self) -> Vec<Arc<dyn CoordinatorObserver>> {
        self.lock().iter().map(|(_, o)| Arc::clone(o)).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("observers", &self.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorEvent {
    Report(ProgressReport),
    Decrypted(String),
}

/// Forwards coordinator output onto an mpsc channel.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<CoordinatorEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CoordinatorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: CoordinatorEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("coordinator event receiver dropped");
        }
    }
}

impl CoordinatorObserver for ChannelObserver {
    fn on_report(&self, report: &ProgressReport) {
        self.send(CoordinatorEvent::Report(report.clone()));
    }

    fn on_decrypted(&self, text: &str) {
        self.send(CoordinatorEvent::Decrypted(text.to_string()));
    }
}

/// Reports go straight to the typewriter queue.
impl CoordinatorObserver for RevealHandle {
    fn on_report(&self, report: &ProgressReport) {
        if !self.report(report.clone()) {
            tracing::trace!("reveal driver stopped; report not shown");
        }
    }
}
