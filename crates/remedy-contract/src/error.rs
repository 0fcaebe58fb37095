//! Error types for the contract store

use crate::types::{ContractId, ContractStatus};

/// Contract store errors
#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    /// Unknown contract id
    #[error("contract not found: {0}")]
    ContractNotFound(ContractId),

    /// State machine misuse
    #[error("invalid transition for {contract_id}: {from} -> {to}")]
    InvalidTransition {
        /// Contract being transitioned
        contract_id: ContractId,
        /// Current status
        from: ContractStatus,
        /// Requested status
        to: ContractStatus,
    },

    /// A contract with no expected effect cannot be scored and must fail
    /// fast rather than silently verify
    #[error("expected_effect is empty; contract cannot be verified")]
    EmptyExpectedEffect,

    /// Actual effect was already recorded for this contract
    #[error("actual_effect already recorded for {0}")]
    ActualAlreadyRecorded(ContractId),

    /// Verification requested before the actual effect was recorded
    #[error("actual_effect not yet recorded for {0}")]
    MissingActualEffect(ContractId),
}
