//! RSA key pairs: generation and PEM encoding for persistence

use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use secrecy::{ExposeSecret, SecretString};

use crate::error::CryptoError;

/// Public and private halves generated together.
///
/// The private key is zeroized on drop by `rsa`.
#[derive(Clone)]
pub struct KeyPair {
    public: RsaPublicKey,
    private: RsaPrivateKey,
}

impl KeyPair {
    /// Generate a fresh pair with a `bits`-bit modulus.
    pub fn generate(bits: usize) -> Result<Self, CryptoError> {
        let private = RsaPrivateKey::new(&mut rand::thread_rng(), bits)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
        let public = private.to_public_key();
        tracing::debug!(bits, "generated RSA key pair");
        Ok(Self { public, private })
    }

    /// Pair two halves, rejecting a public key that does not belong to the
    /// private key.
    pub fn from_parts(public: RsaPublicKey, private: RsaPrivateKey) -> Result<Self, CryptoError> {
        if private.to_public_key() != public {
            return Err(CryptoError::KeyEncoding(
                "public key does not match private key".into(),
            ));
        }
        Ok(Self { public, private })
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }

    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private
    }

    /// Modulus length in bytes; also the size of one encrypted block.
    pub fn modulus_bytes(&self) -> usize {
        self.public.size()
    }

    /// SPKI PEM of the public half.
    pub fn public_pem(&self) -> Result<String, CryptoError> {
        self.public
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| CryptoError::KeyEncoding(format!("public key PEM: {e}")))
    }

    /// PKCS#8 PEM of the private half.
    pub fn private_pem(&self) -> Result<SecretString, CryptoError> {
        let pem = self
            .private
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| CryptoError::KeyEncoding(format!("private key PEM: {e}")))?;
        Ok(SecretString::from(pem.as_str().to_owned()))
    }

    /// Rebuild a pair from the two PEM documents written by
    /// [`public_pem`](Self::public_pem) and [`private_pem`](Self::private_pem).
    pub fn from_pem(public_pem: &str, private_pem: &SecretString) -> Result<Self, CryptoError> {
        let public = RsaPublicKey::from_public_key_pem(public_pem)
            .map_err(|e| CryptoError::KeyEncoding(format!("public key PEM: {e}")))?;
        let private = RsaPrivateKey::from_pkcs8_pem(private_pem.expose_secret())
            .map_err(|e| CryptoError::KeyEncoding(format!("private key PEM: {e}")))?;
        Self::from_parts(public, private)
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("modulus_bits", &(self.modulus_bytes() * 8))
            .field("private", &"[REDACTED]")
            .finish()
    }
}
