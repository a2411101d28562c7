//! Biometric gate in front of decryption.
//!
//! The terminal stands in for the platform sensor: [`PromptGate`] asks for a
//! confirmation without echoing input.

use snote_core::config::{GateConfig, GateMode};

/// Shown when asking the user to authenticate.
pub const AUTHENTICATE_REASON: &str = "Authentication is required to read the message.";

/// Shown after a failed attempt.
pub const AUTHENTICATE_RETRY: &str = "Please try again.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    Authenticated,
    Failed(String),
    /// Biometrics switched off by configuration
    Bypassed,
}

impl GateOutcome {
    pub fn is_open(&self) -> bool {
        !matches!(self, GateOutcome::Failed(_))
    }
}

pub trait BiometricGate: Send + Sync {
    fn authenticate(&self, reason: &str) -> GateOutcome;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BypassGate;

impl BiometricGate for BypassGate {
    fn authenticate(&self, _reason: &str) -> GateOutcome {
        GateOutcome::Bypassed
    }
}

/// Always answers the same way.
#[derive(Debug, Clone, Copy)]
pub struct FixedGate {
    allow: bool,
}

impl FixedGate {
    pub fn allow() -> Self {
        Self { allow: true }
    }

    pub fn deny() -> Self {
        Self { allow: false }
    }
}

impl BiometricGate for FixedGate {
    fn authenticate(&self, _reason: &str) -> GateOutcome {
        if self.allow {
            GateOutcome::Authenticated
        } else {
            GateOutcome::Failed(AUTHENTICATE_RETRY.into())
        }
    }
}

/// Reads a confirmation from the controlling terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptGate;

impl BiometricGate for PromptGate {
    fn authenticate(&self, reason: &str) -> GateOutcome {
        match rpassword::prompt_password(format!("{reason} Unlock? [Y/n] ")) {
            Ok(answer) => judge_answer(&answer),
            Err(e) => {
                tracing::warn!("could not read confirmation: {e}");
                GateOutcome::Failed(e.to_string())
            }
        }
    }
}

fn judge_answer(answer: &str) -> GateOutcome {
    match answer.trim().to_ascii_lowercase().as_str() {
        "" | "y" | "yes" => GateOutcome::Authenticated,
        _ => GateOutcome::Failed(AUTHENTICATE_RETRY.into()),
    }
}

pub fn gate_from_config(config: &GateConfig) -> Box<dyn BiometricGate> {
    if !config.biometrics {
        return Box::new(BypassGate);
    }
    match config.mode {
        GateMode::Prompt => Box::new(PromptGate),
        GateMode::Allow => Box::new(FixedGate::allow()),
        GateMode::Deny => Box::new(FixedGate::deny()),
    }
}
