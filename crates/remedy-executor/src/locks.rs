//! Per-resource serialization
//!
//! Two concurrent actions that target the same resource would race each
//! other's snapshots and benchmarks, so the executor serializes on
//! `resource_id`. Actions on disjoint resources run in parallel up to the
//! pool's concurrency cap.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Keyed async mutexes, one per resource id
#[derive(Debug, Default)]
pub struct ResourceLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ResourceLocks {
    /// Create an empty lock table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for a resource, waiting behind earlier holders
    pub async fn acquire(&self, resource_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(resource_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_resource_serializes() {
        let locks = Arc::new(ResourceLocks::new());
        let concurrent = Arc::new(AtomicU32::new(0));
        let peak = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let locks = Arc::clone(&locks);
            let concurrent = Arc::clone(&concurrent);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire("db-primary").await;
                let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                concurrent.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disjoint_resources_run_in_parallel() {
        let locks = Arc::new(ResourceLocks::new());
        let a = locks.acquire("cache-a").await;
        // Acquiring a different resource must not wait on the first.
        let b = tokio::time::timeout(Duration::from_millis(50), locks.acquire("cache-b")).await;
        assert!(b.is_ok());
        drop(a);
    }
}
