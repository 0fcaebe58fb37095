//! Immutable audit log
//!
//! Every terminal contract transition is appended to an [`AuditSink`]. The
//! in-process [`SignedAuditLog`] hash-chains events and signs each one with
//! an ed25519 key, so external consumers can prove the record was neither
//! reordered nor tampered with. Appends are fire-and-forget from the
//! executor's perspective and never block the state machine.

use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use parking_lot::Mutex;
use remedy_contract::{ContractId, ContractStatus};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Unsigned audit payload produced by the executor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Contract the event belongs to
    pub contract_id: ContractId,
    /// Terminal status reached
    pub status: ContractStatus,
    /// Confidence at the terminal transition
    pub confidence: f64,
    /// When the transition happened
    pub timestamp: DateTime<Utc>,
    /// Short human-readable context (e.g. failure reason)
    pub context: String,
}

/// A chained, signed audit event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// The payload
    pub record: AuditRecord,
    /// Hash of the previous event (zeros for the first)
    pub prev_hash: [u8; 32],
    /// Hash over the payload and `prev_hash`
    pub hash: [u8; 32],
    /// ed25519 signature over `hash`
    pub signature: Signature,
}

/// Append-only audit consumer
pub trait AuditSink: Send + Sync {
    /// Append a terminal-transition record; must never block or fail the
    /// caller
    fn append(&self, record: AuditRecord);
}

/// Audit log integrity errors
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// Hash chain broken or event hash wrong
    #[error("audit chain integrity violation at event {0}")]
    ChainViolation(usize),

    /// Signature does not verify
    #[error("audit signature invalid at event {0}")]
    SignatureInvalid(usize),
}

/// In-memory hash-chained, signed audit log
pub struct SignedAuditLog {
    signing_key: SigningKey,
    events: Mutex<Vec<AuditEvent>>,
}

impl SignedAuditLog {
    /// Create a log signing with the given key
    #[must_use]
    pub fn new(signing_key: SigningKey) -> Self {
        Self {
            signing_key,
            events: Mutex::new(Vec::new()),
        }
    }

    /// The key external consumers verify events with
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Snapshot of all events
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    /// Verify the whole chain: hashes link, and every signature checks out
    ///
    /// # Errors
    /// Returns the index of the first broken event.
    pub fn verify_integrity(&self, verifying_key: &VerifyingKey) -> Result<(), AuditError> {
        let events = self.events.lock();
        let mut prev = [0u8; 32];
        for (i, event) in events.iter().enumerate() {
            if event.prev_hash != prev {
                return Err(AuditError::ChainViolation(i));
            }
            if event.hash != event_hash(&event.record, &event.prev_hash) {
                return Err(AuditError::ChainViolation(i));
            }
            if verifying_key.verify(&event.hash, &event.signature).is_err() {
                return Err(AuditError::SignatureInvalid(i));
            }
            prev = event.hash;
        }
        Ok(())
    }
}

impl AuditSink for SignedAuditLog {
    fn append(&self, record: AuditRecord) {
        let mut events = self.events.lock();
        let prev_hash = events.last().map(|e| e.hash).unwrap_or([0u8; 32]);
        let hash = event_hash(&record, &prev_hash);
        let signature = self.signing_key.sign(&hash);
        tracing::debug!(
            contract_id = %record.contract_id,
            status = %record.status,
            "audit event appended"
        );
        events.push(AuditEvent {
            record,
            prev_hash,
            hash,
            signature,
        });
    }
}

impl std::fmt::Debug for SignedAuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedAuditLog")
            .field("events", &self.events.lock().len())
            .finish_non_exhaustive()
    }
}

fn event_hash(record: &AuditRecord, prev_hash: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(record.contract_id.0 .0.to_le_bytes());
    hasher.update(record.status.to_string().as_bytes());
    hasher.update([0]);
    hasher.update(record.confidence.to_le_bytes());
    hasher.update(record.timestamp.timestamp_micros().to_le_bytes());
    hasher.update(record.context.as_bytes());
    hasher.update([0]);
    hasher.update(prev_hash);
    hasher.finalize().into()
}
