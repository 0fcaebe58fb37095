//! Executor configuration

use crate::adapter::RetryPolicy;
use std::time::Duration;

/// Tunables for the action executor
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Minimum confidence for a contract to verify
    pub confidence_threshold: f64,
    /// Bound on pre-action snapshot capture
    pub snapshot_timeout: Duration,
    /// Bound on rollback restore
    pub restore_timeout: Duration,
    /// Bound on waiting for external approval
    pub approval_timeout: Duration,
    /// Retry policy for transient adapter errors
    pub retry: RetryPolicy,
    /// Pool-wide cap on in-flight actions
    pub max_concurrent_actions: usize,
}

impl ExecutorConfig {
    /// Override the verification threshold
    #[must_use]
    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Override the snapshot capture bound
    #[must_use]
    pub fn with_snapshot_timeout(mut self, timeout: Duration) -> Self {
        self.snapshot_timeout = timeout;
        self
    }

    /// Override the rollback restore bound
    #[must_use]
    pub fn with_restore_timeout(mut self, timeout: Duration) -> Self {
        self.restore_timeout = timeout;
        self
    }

    /// Override the approval wait bound
    #[must_use]
    pub fn with_approval_timeout(mut self, timeout: Duration) -> Self {
        self.approval_timeout = timeout;
        self
    }

    /// Override the adapter retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Override the concurrency cap (minimum 1)
    #[must_use]
    pub fn with_max_concurrent_actions(mut self, max: usize) -> Self {
        self.max_concurrent_actions = max.max(1);
        self
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            snapshot_timeout: Duration::from_secs(60),
            restore_timeout: Duration::from_secs(120),
            approval_timeout: Duration::from_secs(300),
            retry: RetryPolicy::default(),
            max_concurrent_actions: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = ExecutorConfig::default();
        assert!((config.confidence_threshold - 0.7).abs() < f64::EPSILON);
        assert_eq!(config.max_concurrent_actions, 8);
    }

    #[test]
    fn threshold_is_clamped() {
        let config = ExecutorConfig::default().with_confidence_threshold(1.5);
        assert!((config.confidence_threshold - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn concurrency_floor_is_one() {
        let config = ExecutorConfig::default().with_max_concurrent_actions(0);
        assert_eq!(config.max_concurrent_actions, 1);
    }
}
