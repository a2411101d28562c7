use thiserror::Error;

/// Failures from the cryptographic provider, one variant per pipeline step.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("encryption failed at chunk {index}: {reason}")]
    Encryption { index: usize, reason: String },

    #[error("decryption failed at block {index}: {reason}")]
    Decryption { index: usize, reason: String },

    #[error("ciphertext length {len} is not a multiple of the {block}-byte block size")]
    Misaligned { len: usize, block: usize },

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("key encoding: {0}")]
    KeyEncoding(String),
}
