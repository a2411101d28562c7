//! One received envelope waiting behind the biometric gate.

use snote_core::EncryptedEnvelope;
use thiserror::Error;

use crate::coordinator::Coordinator;
use crate::gate::{BiometricGate, GateOutcome, AUTHENTICATE_REASON};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UnlockError {
    /// The gate said no; the message stays locked and may be retried
    #[error("Could not authenticate. {0}")]
    Denied(String),

    /// The envelope was processed but yielded no text
    #[error("the message could not be read")]
    Unreadable,
}

#[derive(Debug)]
pub struct DecryptionSession {
    envelope: Option<EncryptedEnvelope>,
    biometrics: bool,
    decrypted: Option<String>,
}

impl DecryptionSession {
    pub fn new(envelope: EncryptedEnvelope, biometrics: bool) -> Self {
        Self {
            envelope: Some(envelope),
            biometrics,
            decrypted: None,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.envelope.is_some()
    }

    pub fn decrypted(&self) -> Option<&str> {
        self.decrypted.as_deref()
    }

    /// Pass the gate (unless biometrics are off) and decrypt.
    ///
    /// The envelope is processed at most once; later calls return the
    /// earlier result without touching the gate.
    pub fn unlock(
        &mut self,
        coordinator: &Coordinator,
        gate: &dyn BiometricGate,
    ) -> Result<&str, UnlockError> {
        if self.envelope.is_some() {
            let outcome = if self.biometrics {
                gate.authenticate(AUTHENTICATE_REASON)
            } else {
                GateOutcome::Bypassed
            };
            if let GateOutcome::Failed(reason) = outcome {
                tracing::info!("authentication failed: {reason}");
                return Err(UnlockError::Denied(reason));
            }
            tracing::debug!(?outcome, "gate open");
        }

        if let Some(envelope) = self.envelope.take() {
            self.decrypted = coordinator.process(envelope);
        }
        self.decrypted.as_deref().ok_or(UnlockError::Unreadable)
    }
}
