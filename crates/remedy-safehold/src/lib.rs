//! Safe-hold snapshot subsystem
//!
//! A safe-hold snapshot is a recoverable capture of a resource's state taken
//! before a risky action, enabling rollback. The [`SafeHoldManager`] owns the
//! snapshot lifecycle (create, restore, promote-to-golden, supersede) over a
//! pluggable [`StorageBackend`]; integrity of every restore is checked
//! against a content-addressed [`ManifestHash`].

mod backend;
mod error;
mod manager;
mod manifest;
mod types;

pub use backend::{BackendError, Captured, StorageBackend};
pub use error::SafeHoldError;
pub use manager::SafeHoldManager;
pub use manifest::ManifestHash;
pub use types::{Snapshot, SnapshotId, SnapshotKind, SnapshotStatus};
