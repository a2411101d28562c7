//! snote-keys: named RSA key pair persistence
//!
//! Two roles, each stored as two tagged PEM documents:
//!   - `public<roleTag>`  SPKI public key
//!   - `private<roleTag>` PKCS#8 private key
//!
//! Backends (selected by `[keys] backend`):
//!   1. keychain - platform keychain via `keyring`
//!   2. file     - one PEM file per tag under `key_dir`
//!   3. memory   - process memory, lost on exit

pub mod backend;
pub mod file;
pub mod keychain;
pub mod store;

pub use backend::{KeyBackend, MemoryBackend};
pub use file::FileBackend;
pub use keychain::KeychainBackend;
pub use store::{KeyOrigin, KeyStore, KeyStoreError, Resolved};

use std::sync::Arc;

use snote_core::config::{expand_tilde, KeyBackendKind, KeysConfig};

/// Build the backend named in the config.
pub fn backend_from_config(config: &KeysConfig) -> Arc<dyn KeyBackend> {
    match config.backend {
        KeyBackendKind::Keychain => Arc::new(KeychainBackend::new(&config.service)),
        KeyBackendKind::File => Arc::new(FileBackend::new(expand_tilde(&config.key_dir))),
        KeyBackendKind::Memory => Arc::new(MemoryBackend::new()),
    }
}
