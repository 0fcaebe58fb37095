//! Executor error taxonomy
//!
//! Most failure modes are reported in-band as a `Failed` or `RolledBack`
//! [`crate::ActionOutcome`]; an `Err` from the executor means the request
//! never produced a contract outcome at all (bad request or pool shutdown).

use crate::adapter::AdapterError;
use remedy_contract::{ContractError, ContractId};
use remedy_mission::MissionError;
use remedy_safehold::SafeHoldError;
use thiserror::Error;

/// Errors surfaced by the action executor
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Contract store rejected an operation
    #[error(transparent)]
    Contract(#[from] ContractError),

    /// Snapshot or restore failed
    #[error(transparent)]
    SafeHold(#[from] SafeHoldError),

    /// Mission tracker rejected an operation
    #[error(transparent)]
    Mission(#[from] MissionError),

    /// Adapter failed with no rollback point to fall back on
    #[error("adapter failed for contract {contract_id}: {source}")]
    Adapter {
        /// Contract whose action failed
        contract_id: ContractId,
        /// Underlying adapter error
        #[source]
        source: AdapterError,
    },

    /// Governance refused the action
    #[error("action denied by governance: {reason}")]
    Denied {
        /// Governance's stated reason
        reason: String,
    },

    /// Approval did not arrive within the configured bound
    #[error("approval timed out for contract {0}")]
    ApprovalTimeout(ContractId),

    /// The action was cancelled before execution
    #[error("action cancelled before execution for contract {0}")]
    Cancelled(ContractId),

    /// Rollback restore failed; the resource needs human attention
    #[error("rollback failed for contract {contract_id}: {reason}")]
    RollbackFailed {
        /// Contract whose rollback failed
        contract_id: ContractId,
        /// Underlying failure
        reason: String,
    },

    /// A bounded phase exceeded its timeout
    #[error("{phase} timed out for contract {contract_id}")]
    Timeout {
        /// Phase that timed out
        phase: &'static str,
        /// Contract in flight
        contract_id: ContractId,
    },

    /// The executor pool is shutting down
    #[error("executor is shut down")]
    Shutdown,
}
