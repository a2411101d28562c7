use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{SnoteError, SnoteResult};

/// Smallest RSA modulus the key store will generate.
pub const MIN_MODULUS_BITS: usize = 1024;

/// Top-level configuration (loaded from snote.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SnoteConfig {
    pub keys: KeysConfig,
    pub signing: SigningConfig,
    pub delivery: DeliveryConfig,
    pub reveal: RevealConfig,
    pub gate: GateConfig,
    pub log: LogConfig,
}

impl SnoteConfig {
    /// Load configuration from a TOML file, falling back to defaults when the
    /// file does not exist. Callers decide whether a missing file is worth
    /// logging; this runs before logging is set up.
    pub fn load(path: &Path) -> SnoteResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| SnoteError::Config(format!("parsing {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SnoteResult<()> {
        if self.keys.modulus_bits < MIN_MODULUS_BITS {
            return Err(SnoteError::Config(format!(
                "keys.modulus_bits = {} is below the minimum of {MIN_MODULUS_BITS}",
                self.keys.modulus_bits
            )));
        }
        if !(self.reveal.chars_per_second.is_finite() && self.reveal.chars_per_second > 0.0) {
            return Err(SnoteError::Config(format!(
                "reveal.chars_per_second must be positive, got {}",
                self.reveal.chars_per_second
            )));
        }
        if self.keys.backend == KeyBackendKind::File && self.keys.key_dir.as_os_str().is_empty() {
            return Err(SnoteError::Config(
                "keys.key_dir must be set for the file backend".into(),
            ));
        }
        Ok(())
    }
}

/// Where key pairs are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyBackendKind {
    /// Platform keychain via `keyring`
    Keychain,
    /// PEM files in `key_dir`
    File,
    /// Process memory only (keys die with the session)
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    /// RSA modulus size in bits (default: 1024, minimum 1024)
    pub modulus_bits: usize,
    /// Persistence backend (default: file)
    pub backend: KeyBackendKind,
    /// Directory for the file backend
    pub key_dir: PathBuf,
    /// Keychain service name
    pub service: String,
    /// Generate missing key pairs (default: true)
    pub allow_generate: bool,
}

/// Digest fed to the RSA signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestMode {
    /// SHA-256 over the whole ciphertext
    Sha256,
    /// First 32 ciphertext bytes, zero padded. Only the prefix is authenticated.
    Prefix,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    pub digest: DigestMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Delay between backgrounding and notification arrival (default: 1500)
    pub delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RevealConfig {
    /// Typewriter speed (default: 50)
    pub chars_per_second: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateMode {
    /// Ask on the terminal
    Prompt,
    Allow,
    Deny,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Require the biometric gate before decrypting (default: true)
    pub biometrics: bool,
    pub mode: GateMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            modulus_bits: MIN_MODULUS_BITS,
            backend: KeyBackendKind::File,
            key_dir: PathBuf::from("~/.local/share/snote/keys"),
            service: "snote".into(),
            allow_generate: true,
        }
    }
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            digest: DigestMode::Sha256,
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self { delay_ms: 1500 }
    }
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            chars_per_second: 50.0,
        }
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            biometrics: true,
            mode: GateMode::Prompt,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Expand a leading `~/` against `$HOME`.
pub fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => std::env::var("HOME")
            .map(|home| PathBuf::from(home).join(rest))
            .unwrap_or_else(|_| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[keys]
modulus_bits = 2048
backend = "keychain"
service = "snote-test"
allow_generate = false

[signing]
digest = "prefix"

[delivery]
delay_ms = 250

[reveal]
chars_per_second = 120.0

[gate]
biometrics = false
mode = "deny"

[log]
level = "debug"
format = "json"
"#;
        let config: SnoteConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(config.keys.modulus_bits, 2048);
        assert_eq!(config.keys.backend, KeyBackendKind::Keychain);
        assert_eq!(config.keys.service, "snote-test");
        assert!(!config.keys.allow_generate);
        assert_eq!(config.signing.digest, DigestMode::Prefix);
        assert_eq!(config.delivery.delay_ms, 250);
        assert_eq!(config.reveal.chars_per_second, 120.0);
        assert!(!config.gate.biometrics);
        assert_eq!(config.gate.mode, GateMode::Deny);
        assert_eq!(config.log.format, "json");
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_defaults() {
        let config: SnoteConfig = toml::from_str("").unwrap();

        assert_eq!(config.keys.modulus_bits, 1024);
        assert_eq!(config.keys.backend, KeyBackendKind::File);
        assert!(config.keys.allow_generate);
        assert_eq!(config.signing.digest, DigestMode::Sha256);
        assert_eq!(config.delivery.delay_ms, 1500);
        assert_eq!(config.reveal.chars_per_second, 50.0);
        assert!(config.gate.biometrics);
        assert_eq!(config.gate.mode, GateMode::Prompt);
        assert_eq!(config.log.level, "info");
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_partial_config() {
        let config: SnoteConfig = toml::from_str("[delivery]\ndelay_ms = 10\n").unwrap();

        assert_eq!(config.delivery.delay_ms, 10);
        assert_eq!(config.keys.modulus_bits, 1024);
        assert_eq!(config.reveal.chars_per_second, 50.0);
    }

    #[test]
    fn test_validate_rejects_small_modulus() {
        let mut config = SnoteConfig::default();
        config.keys.modulus_bits = 512;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("modulus_bits"));
    }

    #[test]
    fn test_validate_rejects_zero_speed() {
        let mut config = SnoteConfig::default();
        config.reveal.chars_per_second = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = SnoteConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.keys.modulus_bits, 1024);
    }

    #[test]
    fn test_load_missing_file_is_silent() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;
        use tracing_subscriber::layer::{Context, SubscriberExt};
        use tracing_subscriber::Layer;

        struct Count(Arc<AtomicUsize>);

        impl<S: tracing::Subscriber> Layer<S> for Count {
            fn on_event(&self, _event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let events = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(Count(events.clone()));
        let dir = tempfile::tempdir().unwrap();

        let config = tracing::subscriber::with_default(subscriber, || {
            SnoteConfig::load(&dir.path().join("absent.toml")).unwrap()
        });
        assert_eq!(config.log.level, "info");
        assert_eq!(events.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_load_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snote.toml");
        std::fs::write(&path, "[keys]\nmodulus_bits = 256\n").unwrap();
        assert!(SnoteConfig::load(&path).is_err());
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = SnoteConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: SnoteConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.keys.key_dir, parsed.keys.key_dir);
        assert_eq!(config.signing.digest, parsed.signing.digest);
        assert_eq!(config.delivery.delay_ms, parsed.delivery.delay_ms);
    }

    #[test]
    fn test_expand_tilde() {
        let plain = expand_tilde(Path::new("/etc/snote"));
        assert_eq!(plain, PathBuf::from("/etc/snote"));
        if let Ok(home) = std::env::var("HOME") {
            let expanded = expand_tilde(Path::new("~/keys"));
            assert_eq!(expanded, PathBuf::from(home).join("keys"));
        }
    }
}
