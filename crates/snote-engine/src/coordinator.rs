//! Plaintext → signed envelope, and back.
//!
//! ```text
//! try_encrypt:  receiver keys → encrypt → sender keys → sign → hand off
//! process:      sender keys → receiver keys → verify → decrypt → UTF-8
//! ```
//!
//! Each step emits exactly one progress report, success or failure. Failures
//! stop the pipeline and never surface as errors: `try_encrypt` returns
//! `false`, `process` produces no decrypted text.
//!
//! One operation runs at a time. The message state gate refuses a second
//! `try_encrypt` until the first message is decrypted and acknowledged, or
//! fails. An envelope that fails to open never reopens the gate while a
//! sealed message is still in flight.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use snote_core::config::SnoteConfig;
use snote_core::{EncryptedEnvelope, ProgressReport, Role};
use snote_crypto::{decrypt_chunked, encrypt_chunked, KeyPair, Signer};
use snote_keys::{KeyOrigin, KeyStore, Resolved};

use crate::delivery::EnvelopeSink;
use crate::failure::PipelineFailure;
use crate::observer::ObserverRegistry;

pub const ENCRYPTION_COMPLETE: &str = "Encryption complete. Please background the app.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageState {
    /// Ready for a new message
    Pending,
    /// A message is being encrypted, delivered or decrypted
    Processing,
    /// Decrypted text is available; `acknowledge` to start over
    DoneDecrypting,
}

pub struct Coordinator {
    keys: Arc<KeyStore>,
    signer: Signer,
    delivery: Arc<dyn EnvelopeSink>,
    observers: ObserverRegistry,
    state: Mutex<MessageState>,
    // held for the duration of one crypto operation
    busy: Mutex<()>,
}

impl Coordinator {
    pub fn new(keys: Arc<KeyStore>, signer: Signer, delivery: Arc<dyn EnvelopeSink>) -> Self {
        Self {
            keys,
            signer,
            delivery,
            observers: ObserverRegistry::new(),
            state: Mutex::new(MessageState::Pending),
            busy: Mutex::new(()),
        }
    }

    pub fn from_config(
        config: &SnoteConfig,
        keys: Arc<KeyStore>,
        delivery: Arc<dyn EnvelopeSink>,
    ) -> Self {
        Self::new(keys, Signer::new(config.signing.digest), delivery)
    }

    pub fn observers(&self) -> &ObserverRegistry {
        &self.observers
    }

    pub fn keys(&self) -> &KeyStore {
        &self.keys
    }

    pub fn state(&self) -> MessageState {
        *lock(&self.state)
    }

    /// Leave `DoneDecrypting` once the decrypted text has been shown.
    pub fn acknowledge(&self) -> bool {
        let mut state = lock(&self.state);
        if *state == MessageState::DoneDecrypting {
            *state = self.idle_state();
            true
        } else {
            false
        }
    }

    /// Seal `plaintext` and hand it to delivery. True on success.
    pub fn try_encrypt(&self, plaintext: &str) -> bool {
        {
            let mut state = lock(&self.state);
            if *state != MessageState::Pending {
                drop(state);
                self.report(PipelineFailure::Busy.to_string());
                return false;
            }
            *state = MessageState::Processing;
        }

        let _busy = lock(&self.busy);
        match self.seal(plaintext) {
            Ok(()) => {
                self.report(ENCRYPTION_COMPLETE);
                true
            }
            Err(failure) => {
                tracing::debug!("encryption aborted: {failure}");
                self.set_state(MessageState::Pending);
                false
            }
        }
    }

    /// Verify and decrypt an arrived envelope.
    ///
    /// Observers get the text through `on_decrypted`; it is also returned.
    pub fn process(&self, envelope: EncryptedEnvelope) -> Option<String> {
        let _busy = lock(&self.busy);
        let entry = std::mem::replace(&mut *lock(&self.state), MessageState::Processing);

        match self.open(envelope) {
            Ok(text) => {
                self.set_state(MessageState::DoneDecrypting);
                self.observers.decrypted(&text);
                Some(text)
            }
            Err(failure) => {
                tracing::debug!("decryption aborted: {failure}");
                let settled = match entry {
                    MessageState::DoneDecrypting => MessageState::DoneDecrypting,
                    _ => self.idle_state(),
                };
                self.set_state(settled);
                None
            }
        }
    }

    fn seal(&self, plaintext: &str) -> Result<(), PipelineFailure> {
        let receiver = self.resolve(Role::Receiver)?;
        let ciphertext = self.step(
            encrypt_chunked(plaintext.as_bytes(), receiver.public_key())
                .map_err(PipelineFailure::Encryption),
            "Encryption successful.",
        )?;

        let sender = self.resolve(Role::Sender)?;
        let signature = self.step(
            self.signer
                .sign(&ciphertext, sender.private_key())
                .map_err(PipelineFailure::Signing),
            "Signing successful.",
        )?;

        let envelope = EncryptedEnvelope::new(ciphertext, signature);
        self.delivery.hand_off(envelope).map_err(|e| {
            let failure = PipelineFailure::Delivery(e);
            self.report(failure.to_string());
            failure
        })
    }

    fn open(&self, envelope: EncryptedEnvelope) -> Result<String, PipelineFailure> {
        let sender = self.resolve(Role::Sender)?;
        let receiver = self.resolve(Role::Receiver)?;
        let (ciphertext, signature) = envelope.into_parts();

        let verified = if self.signer.verify(&signature, &ciphertext, sender.public_key()) {
            Ok(())
        } else {
            Err(PipelineFailure::VerificationFailure)
        };
        self.step(verified, "Signature verified successfully.")?;

        let clear = self.step(
            decrypt_chunked(&ciphertext, receiver.private_key()).map_err(PipelineFailure::Decryption),
            "Decryption successful.",
        )?;

        let text = String::from_utf8(clear).map_err(|e| PipelineFailure::MessageCorruption(e.utf8_error()));
        self.step(text, "Message decoded successfully.")
    }

    /// Resolve `role`'s pair and report where it came from.
    fn resolve(&self, role: Role) -> Result<Arc<KeyPair>, PipelineFailure> {
        let backend = self.keys.backend_name();
        match self.keys.get_or_create(role) {
            Ok(Resolved { pair, origin }) => {
                let message = match origin {
                    KeyOrigin::Cached => format!("Using {role} keys from this session."),
                    KeyOrigin::Loaded => format!("Loaded {role} keys from {backend}."),
                    KeyOrigin::Created => format!("Created and saved new {role} keys on {backend}."),
                    KeyOrigin::CreatedUnsaved(_) => format!("Couldn't save {role} keys on {backend}."),
                };
                self.report(message);
                Ok(pair)
            }
            Err(source) => {
                tracing::warn!(%role, backend, "key resolution failed: {source}");
                let failure = PipelineFailure::Keys { role, source };
                self.report(failure.to_string());
                Err(failure)
            }
        }
    }

    /// Report the outcome of one pipeline step.
    fn step<T>(&self, result: Result<T, PipelineFailure>, success: &str) -> Result<T, PipelineFailure> {
        match &result {
            Ok(_) => self.report(success),
            Err(failure) => self.report(failure.to_string()),
        }
        result
    }

    fn report(&self, message: impl Into<String>) {
        let report = ProgressReport::new(message);
        tracing::debug!(timestamp = %report.timestamp(), "{}", report.message());
        self.observers.report(&report);
    }

    /// `Pending`, unless a sealed message has not been delivered yet.
    fn idle_state(&self) -> MessageState {
        if self.delivery.in_flight() {
            MessageState::Processing
        } else {
            MessageState::Pending
        }
    }

    fn set_state(&self, next: MessageState) {
        *lock(&self.state) = next;
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("state", &self.state())
            .field("digest", &self.signer.mode())
            .field("observers", &self.observers.len())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
