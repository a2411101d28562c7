use chrono::{Local, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// strftime pattern for report timestamps: `HH:MM:SS.mmm`
pub const TIMESTAMP_FORMAT: &str = "%H:%M:%S%.3f";

/// Every formatted timestamp is exactly this many characters wide.
pub const TIMESTAMP_WIDTH: usize = 12;

/// Which key pair an operation uses.
///
/// The sender pair signs and verifies; the receiver pair encrypts and decrypts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Sender,
    Receiver,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Sender, Role::Receiver];

    /// Persistent tag shared by both halves of this role's key pair.
    pub fn tag(&self) -> &'static str {
        match self {
            Role::Sender => "senderKeys",
            Role::Receiver => "receivedKeys",
        }
    }

    pub fn public_tag(&self) -> String {
        format!("public{}", self.tag())
    }

    pub fn private_tag(&self) -> String {
        format!("private{}", self.tag())
    }

    /// Stable slot index, for per-role arrays.
    pub fn index(&self) -> usize {
        match self {
            Role::Sender => 0,
            Role::Receiver => 1,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Sender => f.write_str("sender"),
            Role::Receiver => f.write_str("receiver"),
        }
    }
}

/// Ciphertext plus the signature computed over it.
///
/// Immutable once built; handed by value from the encrypting side to the
/// delivery collaborator and back into the coordinator.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedEnvelope {
    ciphertext: Vec<u8>,
    signature: Vec<u8>,
}

impl EncryptedEnvelope {
    pub fn new(ciphertext: Vec<u8>, signature: Vec<u8>) -> Self {
        Self {
            ciphertext,
            signature,
        }
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    pub fn into_parts(self) -> (Vec<u8>, Vec<u8>) {
        (self.ciphertext, self.signature)
    }
}

impl fmt::Debug for EncryptedEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedEnvelope")
            .field("ciphertext_len", &self.ciphertext.len())
            .field("signature_len", &self.signature.len())
            .finish()
    }
}

/// A timestamped status line emitted by one pipeline step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressReport {
    timestamp: String,
    message: String,
}

impl ProgressReport {
    /// Stamp a report with the current local time.
    pub fn new(message: impl Into<String>) -> Self {
        Self::at(Local::now().time(), message)
    }

    /// Stamp a report with an explicit time of day.
    pub fn at(time: NaiveTime, message: impl Into<String>) -> Self {
        Self {
            timestamp: time.format(TIMESTAMP_FORMAT).to_string(),
            message: message.into(),
        }
    }

    /// Wall-clock time, always [`TIMESTAMP_WIDTH`] characters
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// `"<timestamp>: <message>"`
    pub fn line(&self) -> String {
        format!("{}: {}", self.timestamp, self.message)
    }
}
