//! snote-engine: the sealed-note pipeline and its collaborators
//!
//! ```text
//!  try_encrypt ─► Coordinator ─► LocalDelivery ─(background, delay)─► inbox
//!                     │                                                │
//!                observers ◄── reports                                 ▼
//!                     │                       DecryptionSession ─► BiometricGate
//!                     ▼                                │
//!              RevealHandle / ChannelObserver          └─► Coordinator::process
//! ```

pub mod coordinator;
pub mod delivery;
pub mod failure;
pub mod gate;
pub mod observer;
pub mod session;

pub use coordinator::{Coordinator, MessageState, ENCRYPTION_COMPLETE};
pub use delivery::{
    DeliveryError, EnvelopeSink, LocalDelivery, NotificationPayload, ENCRYPTED_DATA_SLOT,
    SIGNATURE_SLOT,
};
pub use failure::PipelineFailure;
pub use gate::{
    gate_from_config, BiometricGate, BypassGate, FixedGate, GateOutcome, PromptGate,
    AUTHENTICATE_REASON, AUTHENTICATE_RETRY,
};
pub use observer::{
    ChannelObserver, CoordinatorEvent, CoordinatorObserver, ObserverRegistry, SubscriptionId,
};
pub use session::{DecryptionSession, UnlockError};
