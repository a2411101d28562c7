//! Everything that can stop the pipeline, rendered as report text.
//!
//! None of these cross the coordinator boundary as errors: each becomes one
//! progress report and the caller only sees `false` or no decrypted text.

use std::str::Utf8Error;

use snote_core::Role;
use snote_crypto::CryptoError;
use snote_keys::KeyStoreError;
use thiserror::Error;

use crate::delivery::DeliveryError;

#[derive(Debug, Error)]
pub enum PipelineFailure {
    #[error("Another message is already being processed.")]
    Busy,

    #[error("Couldn't create {role} keys.")]
    Keys {
        role: Role,
        #[source]
        source: KeyStoreError,
    },

    #[error("Encryption error: {0}")]
    Encryption(#[source] CryptoError),

    #[error("Couldn't create signature. {0}")]
    Signing(#[source] CryptoError),

    #[error("Couldn't prepare the notification. {0}")]
    Delivery(#[source] DeliveryError),

    /// Expected outcome for tampered or foreign envelopes
    #[error("Signature verification failed.")]
    VerificationFailure,

    #[error("Decryption failed. {0}")]
    Decryption(#[source] CryptoError),

    /// Decrypted bytes are not UTF-8; the bytes themselves are dropped
    #[error("Message corrupted, can't make a string.")]
    MessageCorruption(#[source] Utf8Error),
}
