//! Platform keychain backend.
//!
//! Uses the `keyring` crate for cross-platform access:
//! - macOS / iOS: Keychain Services
//! - Linux: Secret Service (D-Bus)
//! - Windows: Credential Manager
//!
//! Each tag becomes one keychain entry under the configured service name.

use anyhow::Result;
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroize;

use crate::backend::KeyBackend;

pub struct KeychainBackend {
    service: String,
}

impl KeychainBackend {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    fn entry(&self, tag: &str) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service, tag)
            .map_err(|e| anyhow::anyhow!("keychain entry creation for '{tag}': {e}"))
    }
}

impl KeyBackend for KeychainBackend {
    fn name(&self) -> &str {
        "keychain"
    }

    fn save(&self, tag: &str, key: &SecretString) -> Result<()> {
        self.entry(tag)?
            .set_password(key.expose_secret())
            .map_err(|e| anyhow::anyhow!("keychain store for '{tag}': {e}"))?;
        tracing::debug!(tag, service = %self.service, "stored key in platform keychain");
        Ok(())
    }

    fn load(&self, tag: &str) -> Result<Option<SecretString>> {
        match self.entry(tag)?.get_password() {
            Ok(mut password) => {
                let secret = SecretString::from(password.clone());
                password.zeroize();
                Ok(Some(secret))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(anyhow::anyhow!("keychain get for '{tag}': {e}")),
        }
    }

    fn delete(&self, tag: &str) -> Result<()> {
        match self.entry(tag)?.delete_credential() {
            Ok(()) => {
                tracing::debug!(tag, "deleted key from platform keychain");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(anyhow::anyhow!("keychain delete for '{tag}': {e}")),
        }
    }
}
