//! RSASSA-PKCS1-v1_5 signatures over a digest of the ciphertext
//!
//! Two digest policies exist (see [`DigestMode`]):
//! - `Sha256`: SHA-256 over the whole ciphertext.
//! - `Prefix`: the first [`DIGEST_LEN`] ciphertext bytes are used verbatim as
//!   the "digest" (zero padded when shorter). Anything after the prefix is
//!   not covered by the signature. Kept only for interoperability with
//!   envelopes produced that way.

use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use snote_core::config::DigestMode;

use crate::error::CryptoError;
use crate::DIGEST_LEN;

/// Compute the 32-byte value that gets signed for `data`.
pub fn signing_digest(data: &[u8], mode: DigestMode) -> [u8; DIGEST_LEN] {
    match mode {
        DigestMode::Sha256 => Sha256::digest(data).into(),
        DigestMode::Prefix => {
            let mut digest = [0u8; DIGEST_LEN];
            let n = data.len().min(DIGEST_LEN);
            digest[..n].copy_from_slice(&data[..n]);
            digest
        }
    }
}

/// Signs and verifies ciphertexts under one digest policy.
#[derive(Debug, Clone, Copy)]
pub struct Signer {
    mode: DigestMode,
}

impl Signer {
    pub fn new(mode: DigestMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> DigestMode {
        self.mode
    }

    pub fn sign(&self, data: &[u8], key: &RsaPrivateKey) -> Result<Vec<u8>, CryptoError> {
        let digest = signing_digest(data, self.mode);
        key.sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
            .map_err(|e| CryptoError::Signing(e.to_string()))
    }

    /// Check `signature` against `data`.
    ///
    /// A mismatch is an ordinary outcome and returns `false`.
    pub fn verify(&self, signature: &[u8], data: &[u8], key: &RsaPublicKey) -> bool {
        let digest = signing_digest(data, self.mode);
        match key.verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "signature rejected");
                false
            }
        }
    }
}

impl Default for Signer {
    fn default() -> Self {
        Self::new(DigestMode::Sha256)
    }
}
