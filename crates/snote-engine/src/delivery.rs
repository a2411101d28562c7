//! Simulated local notification carrying an envelope back to the app.
//!
//! Gate: `Idle → Pending(payload) → Sent → Idle`
//!   - `prepare` stores a payload for the next time the app is backgrounded
//!   - `on_background` sends it once; it "arrives" after the configured delay
//!   - `receive` unpacks an arrived payload into the inbox and resets the gate
//!
//! The payload mirrors a notification's user-info dictionary: two named
//! slots holding base64 text, serialised as JSON on the way through.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use snote_core::config::DeliveryConfig;
use snote_core::EncryptedEnvelope;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const ENCRYPTED_DATA_SLOT: &str = "encryptedData";
pub const SIGNATURE_SLOT: &str = "signature";

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("a message is already on its way")]
    AlreadySent,

    #[error("notification slot {0:?} is missing")]
    MissingSlot(&'static str),

    #[error("notification slot {slot:?} is not valid base64: {source}")]
    Encoding {
        slot: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    #[error("notification payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Where the coordinator hands a freshly sealed envelope.
pub trait EnvelopeSink: Send + Sync {
    fn hand_off(&self, envelope: EncryptedEnvelope) -> Result<(), DeliveryError>;

    /// True while a handed-off envelope has not reached the receiving side.
    fn in_flight(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    #[serde(rename = "encryptedData", default, skip_serializing_if = "Option::is_none")]
    encrypted_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    signature: Option<String>,
}

impl NotificationPayload {
    pub fn from_envelope(envelope: &EncryptedEnvelope) -> Self {
        Self {
            encrypted_data: Some(STANDARD.encode(envelope.ciphertext())),
            signature: Some(STANDARD.encode(envelope.signature())),
        }
    }

    pub fn to_json(&self) -> Result<String, DeliveryError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, DeliveryError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Both slots decoded, or an error naming the first bad one.
    pub fn into_envelope(self) -> Result<EncryptedEnvelope, DeliveryError> {
        let ciphertext = decode_slot(ENCRYPTED_DATA_SLOT, self.encrypted_data)?;
        let signature = decode_slot(SIGNATURE_SLOT, self.signature)?;
        Ok(EncryptedEnvelope::new(ciphertext, signature))
    }
}

fn decode_slot(slot: &'static str, value: Option<String>) -> Result<Vec<u8>, DeliveryError> {
    let value = value.ok_or(DeliveryError::MissingSlot(slot))?;
    STANDARD
        .decode(value)
        .map_err(|source| DeliveryError::Encoding { slot, source })
}

#[derive(Debug, Default)]
enum Gate {
    #[default]
    Idle,
    Pending(NotificationPayload),
    Sent,
}

#[derive(Debug)]
pub struct LocalDelivery {
    gate: Mutex<Gate>,
    delay: Duration,
    inbox: mpsc::UnboundedSender<EncryptedEnvelope>,
}

impl LocalDelivery {
    /// A delivery plus the inbox its envelopes arrive on.
    pub fn new(delay: Duration) -> (Arc<Self>, mpsc::UnboundedReceiver<EncryptedEnvelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let delivery = Arc::new(Self {
            gate: Mutex::new(Gate::Idle),
            delay,
            inbox: tx,
        });
        (delivery, rx)
    }

    pub fn from_config(
        config: &DeliveryConfig,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<EncryptedEnvelope>) {
        Self::new(Duration::from_millis(config.delay_ms))
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Store `envelope` for the next background transition, replacing any
    /// payload not yet sent.
    pub fn prepare(&self, envelope: &EncryptedEnvelope) -> Result<(), DeliveryError> {
        let mut gate = self.lock();
        if matches!(*gate, Gate::Sent) {
            return Err(DeliveryError::AlreadySent);
        }
        *gate = Gate::Pending(NotificationPayload::from_envelope(envelope));
        tracing::debug!(bytes = envelope.ciphertext().len(), "notification prepared");
        Ok(())
    }

    /// True while a payload is pending or in flight.
    pub fn is_request_ready(&self) -> bool {
        !matches!(*self.lock(), Gate::Idle)
    }

    /// The app moved to the background: send the pending payload, once.
    ///
    /// Returns the task that delivers it after the delay, or `None` when
    /// there was nothing to send. Must be called inside a tokio runtime.
    pub fn on_background(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let payload = {
            let mut gate = self.lock();
            match std::mem::take(&mut *gate) {
                Gate::Pending(payload) => {
                    *gate = Gate::Sent;
                    payload
                }
                other => {
                    *gate = other;
                    return None;
                }
            }
        };

        let json = match payload.to_json() {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("dropping notification: {e}");
                *self.lock() = Gate::Idle;
                return None;
            }
        };

        tracing::debug!(delay_ms = self.delay.as_millis() as u64, "notification scheduled");
        let this = Arc::clone(self);
        Some(tokio::spawn(async move {
            tokio::time::sleep(this.delay).await;
            match NotificationPayload::from_json(&json) {
                Ok(payload) => {
                    this.receive(payload);
                }
                Err(e) => tracing::warn!("notification arrived unreadable: {e}"),
            }
        }))
    }

    /// Unpack an arrived notification into the inbox.
    ///
    /// A payload missing either slot is ignored and leaves the gate alone.
    pub fn receive(&self, payload: NotificationPayload) -> bool {
        let envelope = match payload.into_envelope() {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!("ignoring notification: {e}");
                return false;
            }
        };

        *self.lock() = Gate::Idle;
        if self.inbox.send(envelope).is_err() {
            tracing::warn!("inbox closed; notification dropped");
            return false;
        }
        tracing::debug!("notification received");
        true
    }

    fn lock(&self) -> MutexGuard<'_, Gate> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EnvelopeSink for LocalDelivery {
    fn hand_off(&self, envelope: EncryptedEnvelope) -> Result<(), DeliveryError> {
        self.prepare(&envelope)
    }

    fn in_flight(&self) -> bool {
        self.is_request_ready()
    }
}
