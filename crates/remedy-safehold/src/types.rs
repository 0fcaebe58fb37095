//! Snapshot record types

use crate::manifest::ManifestHash;
use chrono::{DateTime, Utc};
use remedy_contract::ContractId;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unique snapshot identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SnapshotId(pub Ulid);

impl SnapshotId {
    /// Generate new snapshot ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for SnapshotId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Snapshot kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotKind {
    /// Taken before a specific action, owned by one contract
    PreAction,
    /// Promoted long-lived baseline, independent of any contract
    Golden,
}

/// Snapshot lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotStatus {
    /// Usable rollback target
    Active,
    /// Restore completed
    Restored,
    /// Replaced by a newer golden snapshot
    Superseded,
}

/// A recoverable capture of resource state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Snapshot identifier
    pub snapshot_id: SnapshotId,
    /// Resource this snapshot captures
    pub resource_id: String,
    /// Owning contract (None for golden snapshots)
    pub contract_id: Option<ContractId>,
    /// Pre-action or golden
    pub kind: SnapshotKind,
    /// Integrity hash over the captured manifest
    pub manifest_hash: ManifestHash,
    /// Opaque locator for the storage backend
    pub storage_ref: String,
    /// Lifecycle status
    pub status: SnapshotStatus,
    /// Capture time
    pub created_at: DateTime<Utc>,
    /// When the restore happened, if it did
    pub restored_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    /// Check if this snapshot is still a usable rollback target
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == SnapshotStatus::Active
    }
}
