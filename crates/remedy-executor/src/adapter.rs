//! Action adapter interface
//!
//! The concrete playbook adapters that actually touch infrastructure live
//! outside the core; the executor only requires [`ActionAdapter::perform`].
//! Adapters must be idempotent-safe to retry at least once.

use remedy_contract::EffectMap;
use std::time::Duration;

/// Typed adapter errors
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// Worth retrying after backoff
    #[error("transient adapter error: {0}")]
    Transient(String),

    /// Retrying cannot help; roll back immediately
    #[error("permanent adapter error: {0}")]
    Permanent(String),
}

impl AdapterError {
    /// Check whether this error should be retried
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, AdapterError::Transient(_))
    }
}

/// Pluggable remediation adapter
#[async_trait::async_trait]
pub trait ActionAdapter: Send + Sync {
    /// Perform the action and report the fragment of observable state it
    /// changed
    async fn perform(
        &self,
        action_type: &str,
        parameters: &serde_json::Value,
    ) -> Result<EffectMap, AdapterError>;
}

/// Bounded retry with exponential backoff for transient adapter errors
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first (minimum 1)
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles per retry
    pub backoff_base: Duration,
}

impl RetryPolicy {
    /// Create a policy
    #[inline]
    #[must_use]
    pub fn new(max_attempts: u32, backoff_base: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_base,
        }
    }

    /// Backoff before the given retry (1-based)
    #[inline]
    #[must_use]
    pub fn backoff_for(&self, retry: u32) -> Duration {
        self.backoff_base * 2u32.saturating_pow(retry.saturating_sub(1))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(100))
    }
}

/// Run the adapter under the retry policy
///
/// Permanent errors return immediately; transient errors retry with
/// exponential backoff until attempts are exhausted.
pub(crate) async fn perform_with_retry(
    adapter: &dyn ActionAdapter,
    action_type: &str,
    parameters: &serde_json::Value,
    policy: &RetryPolicy,
) -> Result<EffectMap, AdapterError> {
    let mut attempt = 1;
    loop {
        match adapter.perform(action_type, parameters).await {
            Ok(effect) => return Ok(effect),
            Err(err) if err.is_transient() && attempt < policy.max_attempts => {
                let backoff = policy.backoff_for(attempt);
                tracing::warn!(
                    action_type,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    %err,
                    "transient adapter error; retrying"
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
