//! Error types for the safe-hold manager

use crate::backend::BackendError;
use crate::types::SnapshotId;
use remedy_contract::ContractId;

/// Safe-hold errors
#[derive(Debug, thiserror::Error)]
pub enum SafeHoldError {
    /// The storage backend cannot be reached; fatal for tier >= 2 actions,
    /// which are never allowed to execute without a rollback point
    #[error("snapshot backend unavailable: {0}")]
    BackendUnavailable(#[from] BackendError),

    /// Manifest hash mismatch on restore; corrupted state is never restored
    #[error("integrity violation for snapshot {0}: manifest hash mismatch")]
    IntegrityViolation(SnapshotId),

    /// Unknown snapshot id
    #[error("snapshot not found: {0}")]
    SnapshotNotFound(SnapshotId),

    /// A contract may own at most one pre-action snapshot
    #[error("pre-action snapshot already exists for contract {0}")]
    DuplicatePreAction(ContractId),

    /// The snapshot is not in a restorable state
    #[error("snapshot {snapshot_id} is {status} and cannot be restored")]
    NotRestorable {
        /// Snapshot in question
        snapshot_id: SnapshotId,
        /// Its current status
        status: String,
    },
}
