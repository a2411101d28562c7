//! snote: seal a note, deliver it to yourself, open it again
//!
//! Commands:
//!   send <message>   - encrypt, sign, deliver after a delay, unlock, decrypt
//!   keys             - show whether sender/receiver key pairs are stored
//!   reset-keys       - delete both stored key pairs
//!   config show      - display the effective configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use snote_core::config::{expand_tilde, SnoteConfig};
use snote_core::Role;
use snote_engine::{
    gate_from_config, BiometricGate, BypassGate, Coordinator, DecryptionSession, LocalDelivery,
    UnlockError,
};
use snote_keys::KeyStore;
use snote_reveal::RevealSurface;

/// Gate attempts before `send` gives up on the message.
const MAX_UNLOCK_ATTEMPTS: usize = 3;

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "snote",
    version,
    about = "Sealed notes: RSA-encrypted messages to yourself",
    long_about = "snote: encrypt and sign a note, deliver it as a local notification, \
                  and decrypt it behind a confirmation gate"
)]
struct Cli {
    /// Path to snote.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "SNOTE_CONFIG",
        default_value = "~/.config/snote/snote.toml"
    )]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides [log] level
    #[arg(long, env = "SNOTE_LOG")]
    log: Option<String>,

    /// Log format; overrides [log] format
    #[arg(long, env = "SNOTE_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt a message, deliver it to yourself and decrypt it
    Send {
        /// Text to seal
        message: String,
        /// Skip the confirmation gate before decrypting
        #[arg(long)]
        no_biometrics: bool,
    },

    /// Show which key pairs are stored (never prints key material)
    Keys,

    /// Delete stored key pairs for both roles
    #[command(name = "reset-keys")]
    ResetKeys,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = expand_tilde(&cli.config);
    let config = SnoteConfig::load(&config_path);

    let (level, format) = match &config {
        Ok(config) => (
            cli.log.clone().unwrap_or_else(|| config.log.level.clone()),
            cli.log_format.clone().unwrap_or(match config.log.format.as_str() {
                "json" => LogFormat::Json,
                _ => LogFormat::Text,
            }),
        ),
        Err(_) => (
            cli.log.clone().unwrap_or_else(|| "info".into()),
            cli.log_format.clone().unwrap_or(LogFormat::Text),
        ),
    };
    init_logging(&level, &format);

    if !config_path.exists() {
        tracing::warn!("config file not found: {}  (using defaults)", config_path.display());
    }
    let config = config.with_context(|| format!("loading config: {}", config_path.display()))?;

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        "snote starting"
    );

    match cli.command {
        Commands::Send {
            message,
            no_biometrics,
        } => cmd_send(&config, &message, no_biometrics).await,
        Commands::Keys => cmd_keys(&config),
        Commands::ResetKeys => cmd_reset_keys(&config),
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &config_path),
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout belongs to the typewriter
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── `snote send` ──────────────────────────────────────────────────────────────

/// Types reports onto stdout as they are revealed.
struct TerminalSurface;

impl RevealSurface for TerminalSurface {
    fn append(&mut self, text: &str) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }
}

async fn cmd_send(config: &SnoteConfig, message: &str, no_biometrics: bool) -> Result<()> {
    if message.is_empty() {
        anyhow::bail!("nothing to send: the message is empty");
    }

    let keys = Arc::new(KeyStore::from_config(&config.keys));
    let (delivery, mut inbox) = LocalDelivery::from_config(&config.delivery);
    let coordinator = Arc::new(Coordinator::from_config(config, keys, delivery.clone()));

    let (reveal, driver) = snote_reveal::channel(TerminalSurface, config.reveal.chars_per_second);
    let reveal_task = tokio::spawn(driver.run());
    let subscription = coordinator.observers().subscribe(Arc::new(reveal.clone()));

    // RSA work blocks; keep it off the runtime threads
    let sealed = {
        let coordinator = Arc::clone(&coordinator);
        let message = message.to_string();
        tokio::task::spawn_blocking(move || coordinator.try_encrypt(&message))
            .await
            .context("encryption task")?
    };

    let outcome = if sealed {
        reveal.wait_idle().await;
        open_delivered(config, &coordinator, &delivery, &mut inbox, no_biometrics, &reveal).await
    } else {
        Err(anyhow::anyhow!("encryption failed; see the report above"))
    };

    coordinator.observers().unsubscribe(subscription);
    drop(reveal);
    reveal_task.await.context("reveal task")?;
    println!();

    let text = outcome?;
    println!();
    println!("Decrypted message:");
    println!("{text}");
    coordinator.acknowledge();
    Ok(())
}

/// Background, wait for the notification, then unlock and decrypt it.
async fn open_delivered(
    config: &SnoteConfig,
    coordinator: &Arc<Coordinator>,
    delivery: &Arc<LocalDelivery>,
    inbox: &mut tokio::sync::mpsc::UnboundedReceiver<snote_core::EncryptedEnvelope>,
    no_biometrics: bool,
    reveal: &snote_reveal::RevealHandle,
) -> Result<String> {
    tracing::info!(delay_ms = config.delivery.delay_ms, "app backgrounded; notification scheduled");
    let arrival = delivery
        .on_background()
        .context("no notification was prepared")?;
    arrival.await.context("notification task")?;
    let envelope = inbox.recv().await.context("notification never arrived")?;

    let biometrics = config.gate.biometrics && !no_biometrics;
    let gate: Arc<dyn BiometricGate> = if biometrics {
        Arc::from(gate_from_config(&config.gate))
    } else {
        Arc::new(BypassGate)
    };

    let mut session = DecryptionSession::new(envelope, biometrics);
    for attempt in 1..=MAX_UNLOCK_ATTEMPTS {
        let coordinator = Arc::clone(coordinator);
        let gate = Arc::clone(&gate);
        // the prompt reads the terminal and decryption is CPU-bound
        let (returned, result) = tokio::task::spawn_blocking(move || {
            let result = session
                .unlock(&coordinator, gate.as_ref())
                .map(str::to_string);
            (session, result)
        })
        .await
        .context("unlock task")?;
        session = returned;
        reveal.wait_idle().await;

        match result {
            Ok(text) => return Ok(text),
            Err(UnlockError::Denied(reason)) => {
                eprintln!("\nCould not authenticate. {reason}");
                tracing::debug!(attempt, "gate denied");
            }
            Err(UnlockError::Unreadable) => {
                anyhow::bail!("the message could not be opened; see the report above")
            }
        }
    }
    anyhow::bail!("gave up after {MAX_UNLOCK_ATTEMPTS} failed authentication attempts")
}

// ── `snote keys` / `snote reset-keys` ─────────────────────────────────────────

fn cmd_keys(config: &SnoteConfig) -> Result<()> {
    let keys = KeyStore::from_config(&config.keys);
    println!("backend:  {}", keys.backend_name());
    println!("modulus:  {} bits", keys.modulus_bits());
    for role in Role::ALL {
        let stored = keys
            .is_persisted(role)
            .with_context(|| format!("checking {role} keys"))?;
        println!(
            "{:<9} {:<8} ({}, {})",
            format!("{role}:"),
            if stored { "stored" } else { "missing" },
            role.public_tag(),
            role.private_tag()
        );
    }
    Ok(())
}

fn cmd_reset_keys(config: &SnoteConfig) -> Result<()> {
    let keys = KeyStore::from_config(&config.keys);
    for role in Role::ALL {
        keys.forget(role)
            .with_context(|| format!("deleting {role} keys"))?;
        println!("deleted {role} keys from {}", keys.backend_name());
    }
    Ok(())
}

// ── `snote config show` ───────────────────────────────────────────────────────

fn cmd_config_show(config: &SnoteConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}
