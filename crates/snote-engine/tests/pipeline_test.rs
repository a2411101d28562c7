//! End-to-end tests for the coordinator: seal, deliver, verify, decrypt,
//! and the report trail each path leaves behind.

use std::sync::Arc;

use snote_core::config::DigestMode;
use snote_core::{EncryptedEnvelope, Role};
use snote_crypto::{ciphertext_len, encrypt_chunked, Signer};
use snote_engine::{
    ChannelObserver, Coordinator, CoordinatorEvent, LocalDelivery, MessageState,
    ENCRYPTION_COMPLETE,
};
use snote_keys::{FileBackend, KeyBackend, KeyStore, MemoryBackend};
use tokio::sync::mpsc;

struct Harness {
    coordinator: Coordinator,
    keys: Arc<KeyStore>,
    delivery: Arc<LocalDelivery>,
    inbox: mpsc::UnboundedReceiver<EncryptedEnvelope>,
    events: mpsc::UnboundedReceiver<CoordinatorEvent>,
}

impl Harness {
    fn new(keys: KeyStore, mode: DigestMode) -> Self {
        let keys = Arc::new(keys);
        let (delivery, inbox) = LocalDelivery::new(std::time::Duration::ZERO);
        let coordinator = Coordinator::new(keys.clone(), Signer::new(mode), delivery.clone());
        let (observer, events) = ChannelObserver::new();
        coordinator.observers().subscribe(Arc::new(observer));
        Self {
            coordinator,
            keys,
            delivery,
            inbox,
            events,
        }
    }

    fn memory() -> Self {
        Self::new(
            KeyStore::new(Arc::new(MemoryBackend::new()), 1024),
            DigestMode::Sha256,
        )
    }

    /// Background the app and wait for the notification to land.
    async fn deliver(&mut self) -> EncryptedEnvelope {
        let task = self.delivery.on_background().expect("payload pending");
        task.await.unwrap();
        self.inbox.recv().await.expect("envelope delivered")
    }

    fn drain(&mut self) -> Vec<CoordinatorEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    fn reports(&mut self) -> Vec<String> {
        self.drain()
            .into_iter()
            .filter_map(|e| match e {
                CoordinatorEvent::Report(r) => Some(r.message().to_string()),
                CoordinatorEvent::Decrypted(_) => None,
            })
            .collect()
    }

    /// Envelope sealed directly with the store's keys, bypassing the coordinator.
    fn forge(&self, plaintext: &[u8]) -> EncryptedEnvelope {
        let receiver = self.keys.get_or_create(Role::Receiver).unwrap().pair;
        let sender = self.keys.get_or_create(Role::Sender).unwrap().pair;
        let ciphertext = encrypt_chunked(plaintext, receiver.public_key()).unwrap();
        let signature = Signer::default()
            .sign(&ciphertext, sender.private_key())
            .unwrap();
        EncryptedEnvelope::new(ciphertext, signature)
    }
}

#[tokio::test]
async fn hello_roundtrip_reports_every_step() {
    let mut h = Harness::memory();

    assert!(h.coordinator.try_encrypt("hello"));
    assert!(h.delivery.is_request_ready());
    assert_eq!(
        h.reports(),
        [
            "Created and saved new receiver keys on memory.",
            "Encryption successful.",
            "Created and saved new sender keys on memory.",
            "Signing successful.",
            ENCRYPTION_COMPLETE,
        ]
    );

    let envelope = h.deliver().await;
    assert!(!h.delivery.is_request_ready());
    assert_eq!(envelope.ciphertext().len(), 128);
    assert_eq!(envelope.signature().len(), 128);

    let sender = h.keys.get_or_create(Role::Sender).unwrap().pair;
    assert!(Signer::default().verify(envelope.signature(), envelope.ciphertext(), sender.public_key()));

    assert_eq!(h.coordinator.process(envelope).as_deref(), Some("hello"));
    assert_eq!(h.coordinator.state(), MessageState::DoneDecrypting);

    let events = h.drain();
    let reports: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            CoordinatorEvent::Report(r) => Some(r.message()),
            CoordinatorEvent::Decrypted(_) => None,
        })
        .collect();
    assert_eq!(
        reports,
        [
            "Using sender keys from this session.",
            "Using receiver keys from this session.",
            "Signature verified successfully.",
            "Decryption successful.",
            "Message decoded successfully.",
        ]
    );
    assert_eq!(
        events.last(),
        Some(&CoordinatorEvent::Decrypted("hello".into()))
    );
}

#[tokio::test]
async fn multi_chunk_unicode_roundtrip() {
    let mut h = Harness::memory();
    let message = "Sealed note → ünïcödé ✓ ".repeat(20);

    assert!(h.coordinator.try_encrypt(&message));
    let envelope = h.deliver().await;
    assert_eq!(envelope.ciphertext().len(), ciphertext_len(message.len(), 128));
    assert!(envelope.ciphertext().len() > 128);

    assert_eq!(h.coordinator.process(envelope), Some(message));
}

#[tokio::test]
async fn empty_message_roundtrips() {
    let mut h = Harness::memory();
    assert!(h.coordinator.try_encrypt(""));
    let envelope = h.deliver().await;
    assert!(envelope.ciphertext().is_empty());
    assert_eq!(h.coordinator.process(envelope).as_deref(), Some(""));
}

#[test]
fn unavailable_keys_fail_without_envelope() {
    let keys = KeyStore::new(Arc::new(MemoryBackend::failing()), 1024).with_generation(false);
    let mut h = Harness::new(keys, DigestMode::Sha256);

    assert!(!h.coordinator.try_encrypt("hello"));
    assert!(!h.delivery.is_request_ready());
    assert!(h.inbox.try_recv().is_err());
    assert_eq!(h.coordinator.state(), MessageState::Pending);
    assert_eq!(h.reports(), ["Couldn't create receiver keys."]);
}

#[tokio::test]
async fn unsaved_keys_still_encrypt() {
    let mut h = Harness::new(
        KeyStore::new(Arc::new(MemoryBackend::failing()), 1024),
        DigestMode::Sha256,
    );

    assert!(h.coordinator.try_encrypt("kept in memory"));
    let reports = h.reports();
    assert_eq!(reports[0], "Couldn't save receiver keys on memory.");
    assert_eq!(reports[2], "Couldn't save sender keys on memory.");

    let envelope = h.deliver().await;
    assert_eq!(h.coordinator.process(envelope).as_deref(), Some("kept in memory"));
}

#[tokio::test]
async fn tampered_ciphertext_is_rejected_silently() {
    let mut h = Harness::memory();
    assert!(h.coordinator.try_encrypt("do not touch"));
    let (mut ciphertext, signature) = h.deliver().await.into_parts();
    ciphertext[40] ^= 0x01;
    h.drain();

    assert_eq!(h.coordinator.process(EncryptedEnvelope::new(ciphertext, signature)), None);
    assert_eq!(h.coordinator.state(), MessageState::Pending);

    let events = h.drain();
    assert!(!events.iter().any(|e| matches!(e, CoordinatorEvent::Decrypted(_))));
    let last = match events.last() {
        Some(CoordinatorEvent::Report(r)) => r.message().to_string(),
        other => panic!("unexpected {other:?}"),
    };
    assert_eq!(last, "Signature verification failed.");
}

#[tokio::test]
async fn tampered_signature_is_rejected() {
    let mut h = Harness::memory();
    assert!(h.coordinator.try_encrypt("signed"));
    let (ciphertext, mut signature) = h.deliver().await.into_parts();
    signature[0] ^= 0x80;
    h.drain();

    assert_eq!(h.coordinator.process(EncryptedEnvelope::new(ciphertext, signature)), None);
    assert!(h.reports().contains(&"Signature verification failed.".to_string()));
}

#[test]
fn invalid_utf8_is_reported_as_corruption() {
    let mut h = Harness::memory();
    let envelope = h.forge(&[0x68, 0x69, 0xff, 0xfe]);
    h.drain();

    assert_eq!(h.coordinator.process(envelope), None);
    let events = h.drain();
    assert!(!events.iter().any(|e| matches!(e, CoordinatorEvent::Decrypted(_))));
    let reports: Vec<String> = events
        .into_iter()
        .filter_map(|e| match e {
            CoordinatorEvent::Report(r) => Some(r.message().to_string()),
            CoordinatorEvent::Decrypted(_) => None,
        })
        .collect();
    assert_eq!(
        &reports[reports.len() - 2..],
        ["Decryption successful.", "Message corrupted, can't make a string."]
    );
}

#[test]
fn misaligned_ciphertext_fails_decryption() {
    let mut h = Harness::memory();
    let sender = h.keys.get_or_create(Role::Sender).unwrap().pair;
    h.keys.get_or_create(Role::Receiver).unwrap();
    let ciphertext = vec![7u8; 100];
    let signature = Signer::default()
        .sign(&ciphertext, sender.private_key())
        .unwrap();

    assert_eq!(h.coordinator.process(EncryptedEnvelope::new(ciphertext, signature)), None);
    let reports = h.reports();
    assert_eq!(reports[reports.len() - 2], "Signature verified successfully.");
    assert!(reports[reports.len() - 1].starts_with("Decryption failed. "));
}

#[tokio::test]
async fn prefix_digest_mode_roundtrips() {
    let mut h = Harness::new(
        KeyStore::new(Arc::new(MemoryBackend::new()), 1024),
        DigestMode::Prefix,
    );
    assert!(h.coordinator.try_encrypt("compat"));
    let envelope = h.deliver().await;
    assert_eq!(h.coordinator.process(envelope).as_deref(), Some("compat"));
}

#[tokio::test]
async fn persisted_keys_open_envelopes_from_earlier_session() {
    let dir = tempfile::tempdir().unwrap();
    let backend = || -> Arc<dyn KeyBackend> { Arc::new(FileBackend::new(dir.path())) };

    let mut first = Harness::new(KeyStore::new(backend(), 1024), DigestMode::Sha256);
    assert!(first.coordinator.try_encrypt("see you later"));
    let envelope = first.deliver().await;

    let mut second = Harness::new(KeyStore::new(backend(), 1024), DigestMode::Sha256);
    assert_eq!(second.coordinator.process(envelope).as_deref(), Some("see you later"));
    let reports = second.reports();
    assert_eq!(reports[0], "Loaded sender keys from file.");
    assert_eq!(reports[1], "Loaded receiver keys from file.");
}

#[test]
fn second_message_refused_until_acknowledged() {
    let mut h = Harness::memory();
    assert!(h.coordinator.try_encrypt("one"));
    h.drain();

    assert!(!h.coordinator.try_encrypt("two"));
    assert_eq!(h.reports(), ["Another message is already being processed."]);
}

#[tokio::test]
async fn stray_envelope_does_not_reopen_gate_for_undelivered_message() {
    let mut h = Harness::memory();
    assert!(h.coordinator.try_encrypt("one"));
    h.drain();

    let stray = EncryptedEnvelope::new(vec![0; 128], vec![0; 128]);
    assert_eq!(h.coordinator.process(stray), None);
    assert_eq!(h.coordinator.state(), MessageState::Processing);

    assert!(!h.coordinator.try_encrypt("two"));
    assert_eq!(
        h.reports().last().map(String::as_str),
        Some("Another message is already being processed.")
    );

    let envelope = h.deliver().await;
    assert_eq!(h.coordinator.process(envelope).as_deref(), Some("one"));
    assert!(h.coordinator.acknowledge());
    assert_eq!(h.coordinator.state(), MessageState::Pending);
}
