//! Storage backend interface
//!
//! The manager does not know how a resource is captured (file copy, DB dump,
//! volume clone); it only requires the primitives below. Implementations are
//! supplied externally and swapped in by configuration.

use crate::manifest::ManifestHash;

/// Result of capturing a resource's state
#[derive(Debug, Clone)]
pub struct Captured {
    /// Opaque locator the backend can restore from
    pub storage_ref: String,
    /// Manifest describing the captured state, hashed for integrity
    pub manifest: Vec<u8>,
}

/// Errors surfaced by a storage backend
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The backend cannot be reached at all
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    /// The referenced capture does not exist
    #[error("unknown storage ref: {0}")]
    UnknownRef(String),

    /// The capture or restore primitive failed
    #[error("backend operation failed: {0}")]
    OperationFailed(String),
}

/// Pluggable snapshot storage backend
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync {
    /// Capture a manifest of the resource's current state
    async fn capture(&self, resource_id: &str) -> Result<Captured, BackendError>;

    /// Restore the resource from a previous capture
    async fn restore(&self, storage_ref: &str) -> Result<(), BackendError>;

    /// Check a stored capture against its recorded integrity hash
    async fn verify(
        &self,
        storage_ref: &str,
        manifest_hash: &ManifestHash,
    ) -> Result<bool, BackendError>;
}
