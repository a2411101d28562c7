//! The persistence seam: opaque key documents in, opaque key documents out.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use anyhow::Result;
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroizing;

/// Durable storage for tagged key documents.
pub trait KeyBackend: Send + Sync {
    /// Short name used in logs and reports ("keychain", "file", ...)
    fn name(&self) -> &str;

    /// Store `key` under `tag`, replacing any previous value.
    fn save(&self, tag: &str, key: &SecretString) -> Result<()>;

    /// Fetch the document stored under `tag`, `None` when absent.
    fn load(&self, tag: &str) -> Result<Option<SecretString>>;

    /// Remove `tag`; removing a missing tag is not an error.
    fn delete(&self, tag: &str) -> Result<()>;
}

/// In-process backend. Keys live as long as the backend does.
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, Zeroizing<String>>>,
    failing: bool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose every operation fails, for exercising degraded paths.
    pub fn failing() -> Self {
        Self {
            entries: Mutex::default(),
            failing: true,
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self, op: &str, tag: &str) -> Result<()> {
        if self.failing {
            anyhow::bail!("memory backend refused {op} for '{tag}'");
        }
        Ok(())
    }
}

impl KeyBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    fn save(&self, tag: &str, key: &SecretString) -> Result<()> {
        self.check("save", tag)?;
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(tag.to_string(), Zeroizing::new(key.expose_secret().to_string()));
        Ok(())
    }

    fn load(&self, tag: &str) -> Result<Option<SecretString>> {
        self.check("load", tag)?;
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(tag)
            .map(|value| SecretString::from(value.as_str().to_owned())))
    }

    fn delete(&self, tag: &str) -> Result<()> {
        self.check("delete", tag)?;
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(tag);
        Ok(())
    }
}
