//! snote-crypto: RSA orchestration for sealed notes
//!
//! Pipeline: plaintext → split into (modulus − 11)-byte chunks → PKCS#1 v1.5
//! encrypt each chunk → concatenate → sign digest of ciphertext
//!
//! ```text
//! Receiver key pair ── encrypt (public) / decrypt (private)
//! Sender key pair   ── sign (private)    / verify (public)
//!
//! ciphertext = E(chunk_0) || E(chunk_1) || ... ,  |E(chunk_i)| = modulus bytes
//! signature  = RSASSA-PKCS1-v1_5(SHA-256 digest)
//! ```
//!
//! The RSA math itself comes from the `rsa` crate; nothing here implements
//! primitives.

pub mod chunk;
pub mod error;
pub mod keys;
pub mod sign;

pub use chunk::{ciphertext_len, decrypt_chunked, encrypt_chunked, plaintext_block_size};
pub use error::CryptoError;
pub use keys::KeyPair;
pub use sign::{signing_digest, Signer};

/// PKCS#1 v1.5 encryption padding overhead per block, in bytes
pub const PKCS1_OVERHEAD: usize = 11;

/// Size of the digest that gets signed (SHA-256)
pub const DIGEST_LEN: usize = 32;
