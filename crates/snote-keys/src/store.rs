//! Lazily created, persisted key pairs per role.
//!
//! Resolution order for a role:
//!   1. pair already resolved in this session
//!   2. both halves loadable from the backend
//!   3. generate a fresh pair, then try to persist it
//!
//! A failed save does not fail resolution: the pair is used for the session
//! and the caller is told through [`KeyOrigin::CreatedUnsaved`].
//!
//! Each role has its own lock held for the whole resolution, so concurrent
//! first use of a role generates exactly one pair.

use std::sync::{Arc, Mutex, PoisonError};

use secrecy::{ExposeSecret, SecretString};
use snote_core::config::KeysConfig;
use snote_core::Role;
use snote_crypto::{CryptoError, KeyPair};
use thiserror::Error;

use crate::backend::KeyBackend;

#[derive(Debug, Error)]
pub enum KeyStoreError {
    #[error("could not generate {role} keys: {source}")]
    Generation {
        role: Role,
        #[source]
        source: CryptoError,
    },

    #[error("no {role} keys stored and key generation is disabled")]
    GenerationDisabled { role: Role },

    #[error("key persistence for {role}: {reason}")]
    Persistence { role: Role, reason: String },
}

/// Where a resolved pair came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOrigin {
    /// Resolved earlier in this session
    Cached,
    /// Loaded from the backend
    Loaded,
    /// Generated and saved
    Created,
    /// Generated but the save failed; lives only for this session
    CreatedUnsaved(String),
}

#[derive(Debug, Clone)]
pub struct Resolved {
    pub pair: Arc<KeyPair>,
    pub origin: KeyOrigin,
}

pub struct KeyStore {
    backend: Arc<dyn KeyBackend>,
    modulus_bits: usize,
    allow_generate: bool,
    slots: [Mutex<Option<Arc<KeyPair>>>; 2],
}

impl KeyStore {
    pub fn new(backend: Arc<dyn KeyBackend>, modulus_bits: usize) -> Self {
        Self {
            backend,
            modulus_bits,
            allow_generate: true,
            slots: [Mutex::new(None), Mutex::new(None)],
        }
    }

    pub fn from_config(config: &KeysConfig) -> Self {
        Self::new(crate::backend_from_config(config), config.modulus_bits)
            .with_generation(config.allow_generate)
    }

    /// Allow or forbid generating pairs that are not already stored.
    pub fn with_generation(mut self, allow: bool) -> Self {
        self.allow_generate = allow;
        self
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn modulus_bits(&self) -> usize {
        self.modulus_bits
    }

    /// Return the pair for `role`, loading or creating it on first use.
    pub fn get_or_create(&self, role: Role) -> Result<Resolved, KeyStoreError> {
        let mut slot = self.slots[role.index()]
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(pair) = slot.as_ref() {
            return Ok(Resolved {
                pair: Arc::clone(pair),
                origin: KeyOrigin::Cached,
            });
        }

        match self.load(role) {
            Ok(Some(pair)) => {
                tracing::debug!(
                    %role,
                    public = %role.public_tag(),
                    private = %role.private_tag(),
                    backend = self.backend.name(),
                    "loaded key pair"
                );
                let pair = Arc::new(pair);
                *slot = Some(Arc::clone(&pair));
                return Ok(Resolved {
                    pair,
                    origin: KeyOrigin::Loaded,
                });
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(%role, backend = self.backend.name(), "stored keys unusable: {e:#}");
            }
        }

        if !self.allow_generate {
            return Err(KeyStoreError::GenerationDisabled { role });
        }

        let pair = KeyPair::generate(self.modulus_bits)
            .map_err(|source| KeyStoreError::Generation { role, source })?;

        let origin = match self.persist(role, &pair) {
            Ok(()) => {
                tracing::debug!(%role, backend = self.backend.name(), "created and saved key pair");
                KeyOrigin::Created
            }
            Err(e) => {
                tracing::warn!(%role, backend = self.backend.name(), "keeping unsaved keys for this session: {e:#}");
                KeyOrigin::CreatedUnsaved(format!("{e:#}"))
            }
        };

        let pair = Arc::new(pair);
        *slot = Some(Arc::clone(&pair));
        Ok(Resolved { pair, origin })
    }

    /// True when both halves for `role` are present in the backend.
    pub fn is_persisted(&self, role: Role) -> anyhow::Result<bool> {
        let public = self.backend.load(&role.public_tag())?;
        let private = self.backend.load(&role.private_tag())?;
        Ok(public.is_some() && private.is_some())
    }

    /// Drop the session copy and the persisted halves for `role`.
    pub fn forget(&self, role: Role) -> Result<(), KeyStoreError> {
        let mut slot = self.slots[role.index()]
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = None;

        for tag in [role.private_tag(), role.public_tag()] {
            self.backend
                .delete(&tag)
                .map_err(|e| KeyStoreError::Persistence {
                    role,
                    reason: format!("{e:#}"),
                })?;
        }
        tracing::debug!(%role, backend = self.backend.name(), "forgot key pair");
        Ok(())
    }

    /// Both halves or nothing; a lone half counts as absent.
    fn load(&self, role: Role) -> anyhow::Result<Option<KeyPair>> {
        let public = self.backend.load(&role.public_tag())?;
        let private = self.backend.load(&role.private_tag())?;
        match (public, private) {
            (Some(public), Some(private)) => {
                let pair = KeyPair::from_pem(public.expose_secret(), &private)?;
                Ok(Some(pair))
            }
            (None, None) => Ok(None),
            _ => {
                tracing::warn!(%role, "only one half of the key pair is stored; regenerating");
                Ok(None)
            }
        }
    }

    fn persist(&self, role: Role, pair: &KeyPair) -> anyhow::Result<()> {
        let private = pair.private_pem()?;
        let public = SecretString::from(pair.public_pem()?);
        self.backend.save(&role.private_tag(), &private)?;
        self.backend.save(&role.public_tag(), &public)?;
        Ok(())
    }
}
