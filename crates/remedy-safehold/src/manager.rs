//! Safe-hold manager
//!
//! Owns the [`Snapshot`] lifecycle. Restores are idempotent and always
//! integrity-checked; a manifest hash mismatch aborts the restore with the
//! resource state untouched.

use crate::backend::StorageBackend;
use crate::error::SafeHoldError;
use crate::manifest::ManifestHash;
use crate::types::{Snapshot, SnapshotId, SnapshotKind, SnapshotStatus};
use chrono::Utc;
use dashmap::DashMap;
use remedy_contract::ContractId;
use std::sync::Arc;

/// Manager for safe-hold snapshots
pub struct SafeHoldManager {
    backend: Arc<dyn StorageBackend>,
    snapshots: DashMap<SnapshotId, Snapshot>,
    /// One pre-action snapshot per contract
    pre_action: DashMap<ContractId, SnapshotId>,
    /// Active golden snapshot per resource
    golden: DashMap<String, SnapshotId>,
}

impl SafeHoldManager {
    /// Create a manager over a storage backend
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            snapshots: DashMap::new(),
            pre_action: DashMap::new(),
            golden: DashMap::new(),
        }
    }

    /// Capture a snapshot of a resource
    ///
    /// Pre-action snapshots require an owning contract and are unique per
    /// contract. Golden captures supersede the previous golden snapshot for
    /// the resource.
    ///
    /// # Errors
    /// - `SafeHoldError::DuplicatePreAction` on a second pre-action capture
    ///   for the same contract
    /// - `SafeHoldError::BackendUnavailable` when the backend fails; callers
    ///   must treat this as fatal for tier >= 2 actions
    pub async fn snapshot(
        &self,
        resource_id: &str,
        contract_id: Option<ContractId>,
        kind: SnapshotKind,
    ) -> Result<Snapshot, SafeHoldError> {
        if kind == SnapshotKind::PreAction {
            if let Some(cid) = contract_id {
                if self.pre_action.contains_key(&cid) {
                    return Err(SafeHoldError::DuplicatePreAction(cid));
                }
            }
        }

        let captured = self.backend.capture(resource_id).await?;
        let manifest_hash = ManifestHash::compute(&captured.manifest);

        let snapshot = Snapshot {
            snapshot_id: SnapshotId::new(),
            resource_id: resource_id.to_string(),
            contract_id,
            kind,
            manifest_hash,
            storage_ref: captured.storage_ref,
            status: SnapshotStatus::Active,
            created_at: Utc::now(),
            restored_at: None,
        };

        tracing::info!(
            snapshot_id = %snapshot.snapshot_id,
            resource_id,
            kind = ?kind,
            hash = %manifest_hash.short(),
            "snapshot captured"
        );

        match kind {
            SnapshotKind::PreAction => {
                if let Some(cid) = contract_id {
                    self.pre_action.insert(cid, snapshot.snapshot_id);
                }
            }
            SnapshotKind::Golden => {
                self.install_golden(resource_id, snapshot.snapshot_id);
            }
        }

        self.snapshots
            .insert(snapshot.snapshot_id, snapshot.clone());
        Ok(snapshot)
    }

    /// Restore a resource from a snapshot
    ///
    /// Idempotent: restoring an already-restored snapshot is a no-op
    /// success. The stored manifest hash is re-verified through the backend
    /// before anything is touched.
    ///
    /// # Errors
    /// - `SafeHoldError::SnapshotNotFound` if unknown
    /// - `SafeHoldError::NotRestorable` for superseded snapshots
    /// - `SafeHoldError::IntegrityViolation` on hash mismatch; the resource
    ///   is left untouched
    /// - `SafeHoldError::BackendUnavailable` when the backend fails
    pub async fn restore(&self, snapshot_id: SnapshotId) -> Result<(), SafeHoldError> {
        let (storage_ref, manifest_hash) = {
            let entry = self
                .snapshots
                .get(&snapshot_id)
                .ok_or(SafeHoldError::SnapshotNotFound(snapshot_id))?;
            match entry.status {
                SnapshotStatus::Restored => {
                    tracing::debug!(snapshot_id = %snapshot_id, "restore already applied");
                    return Ok(());
                }
                SnapshotStatus::Superseded => {
                    return Err(SafeHoldError::NotRestorable {
                        snapshot_id,
                        status: "superseded".to_string(),
                    });
                }
                SnapshotStatus::Active => {}
            }
            (entry.storage_ref.clone(), entry.manifest_hash)
        };

        let intact = self.backend.verify(&storage_ref, &manifest_hash).await?;
        if !intact {
            tracing::error!(
                snapshot_id = %snapshot_id,
                hash = %manifest_hash.short(),
                "stored manifest failed integrity check; refusing to restore"
            );
            return Err(SafeHoldError::IntegrityViolation(snapshot_id));
        }

        self.backend.restore(&storage_ref).await?;

        if let Some(mut entry) = self.snapshots.get_mut(&snapshot_id) {
            entry.status = SnapshotStatus::Restored;
            entry.restored_at = Some(Utc::now());
        }
        tracing::info!(snapshot_id = %snapshot_id, "snapshot restored");
        Ok(())
    }

    /// Promote a snapshot to a long-lived golden baseline
    ///
    /// Creates a new independent golden record sharing the source's storage
    /// ref and manifest hash; the previous golden snapshot for the resource
    /// is superseded.
    ///
    /// # Errors
    /// - `SafeHoldError::SnapshotNotFound` if unknown
    /// - `SafeHoldError::NotRestorable` when the source is superseded
    pub async fn promote_to_golden(
        &self,
        snapshot_id: SnapshotId,
    ) -> Result<Snapshot, SafeHoldError> {
        let source = self
            .snapshots
            .get(&snapshot_id)
            .ok_or(SafeHoldError::SnapshotNotFound(snapshot_id))?
            .clone();

        if source.status == SnapshotStatus::Superseded {
            return Err(SafeHoldError::NotRestorable {
                snapshot_id,
                status: "superseded".to_string(),
            });
        }

        let golden = Snapshot {
            snapshot_id: SnapshotId::new(),
            resource_id: source.resource_id.clone(),
            contract_id: None,
            kind: SnapshotKind::Golden,
            manifest_hash: source.manifest_hash,
            storage_ref: source.storage_ref.clone(),
            status: SnapshotStatus::Active,
            created_at: Utc::now(),
            restored_at: None,
        };

        tracing::info!(
            golden_id = %golden.snapshot_id,
            source_id = %snapshot_id,
            resource_id = %golden.resource_id,
            "snapshot promoted to golden"
        );

        self.install_golden(&golden.resource_id, golden.snapshot_id);
        self.snapshots.insert(golden.snapshot_id, golden.clone());
        Ok(golden)
    }

    /// Get a snapshot by id
    #[must_use]
    pub fn get(&self, snapshot_id: SnapshotId) -> Option<Snapshot> {
        self.snapshots.get(&snapshot_id).map(|s| s.clone())
    }

    /// The pre-action snapshot owned by a contract, if one exists
    #[must_use]
    pub fn pre_action_for(&self, contract_id: ContractId) -> Option<Snapshot> {
        self.pre_action
            .get(&contract_id)
            .and_then(|id| self.get(*id))
    }

    /// The active golden snapshot for a resource, if one exists
    #[must_use]
    pub fn golden_for(&self, resource_id: &str) -> Option<Snapshot> {
        self.golden.get(resource_id).and_then(|id| self.get(*id))
    }

    /// Register the new golden snapshot, superseding any previous one
    fn install_golden(&self, resource_id: &str, new_id: SnapshotId) {
        if let Some(previous) = self.golden.insert(resource_id.to_string(), new_id) {
            if let Some(mut entry) = self.snapshots.get_mut(&previous) {
                entry.status = SnapshotStatus::Superseded;
                tracing::debug!(snapshot_id = %previous, resource_id, "golden superseded");
            }
        }
    }
}

impl std::fmt::Debug for SafeHoldManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafeHoldManager")
            .field("snapshots", &self.snapshots.len())
            .finish_non_exhaustive()
    }
}
