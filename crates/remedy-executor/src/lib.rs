//! Action executor
//!
//! The orchestration core of the verified self-healing pipeline. One state
//! machine instance per invocation of
//! [`ActionExecutor::execute_verified_action`]:
//!
//! ```text
//! PENDING --(tier>=2: snapshot ok)--> SNAPSHOTTED --(adapter ok)--> EXECUTED
//! PENDING --(tier==1)---------------------------------------------> EXECUTED
//! EXECUTED --(benchmark)--> BENCHMARKED --(confidence>=threshold)--> VERIFIED
//! BENCHMARKED --(low confidence, snapshot exists)--> ROLLING_BACK --> ROLLED_BACK
//! ROLLING_BACK --(restore fails)--> FAILED
//! PENDING/SNAPSHOTTED --(backend unavailable, tier>=2)--> FAILED
//! ```
//!
//! Tier 1 actions skip snapshotting: their blast radius is defined to be
//! negligible. Tier >= 2 actions are never allowed to execute without a
//! rollback point; that is a safety invariant, not an optimization. Every
//! terminal transition appends a signed audit event, emits an outcome to the
//! learning collector, and updates the owning mission when one is named.

mod adapter;
mod audit;
mod cancel;
mod config;
mod error;
mod executor;
mod governance;
mod learning;
mod locks;

pub use adapter::{ActionAdapter, AdapterError, RetryPolicy};
pub use audit::{AuditError, AuditEvent, AuditRecord, AuditSink, SignedAuditLog};
pub use cancel::CancelToken;
pub use config::ExecutorConfig;
pub use error::ExecutorError;
pub use executor::{ActionExecutor, ActionOutcome, ActionRequest, OutcomeStatus};
pub use governance::{Authorization, GovernanceGate};
pub use learning::{LearningCollector, OutcomeEvent};
pub use locks::ResourceLocks;
