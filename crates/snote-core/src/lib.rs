pub mod config;
pub mod error;
pub mod types;

pub use error::{SnoteError, SnoteResult};
pub use types::{EncryptedEnvelope, ProgressReport, Role, TIMESTAMP_FORMAT, TIMESTAMP_WIDTH};
