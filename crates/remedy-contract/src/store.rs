//! Contract store
//!
//! The single writer for [`ActionContract`] records. Contracts are never
//! deleted (audit requirement); terminal contracts accept no further
//! mutation, and every status transition is validated against the graph in
//! [`ContractStatus::allowed_transitions`].

use crate::error::ContractError;
use crate::scoring::{score_effects, Verification};
use crate::types::{
    ActionContract, AutonomyTier, ContractId, ContractStatus, EffectMap, ExpectationMap,
    StatusChange,
};
use chrono::Utc;
use dashmap::DashMap;

/// Parameters for creating a contract
#[derive(Debug, Clone)]
pub struct CreateContract {
    /// Action type (e.g. "clear_lock")
    pub action_type: String,
    /// Owning playbook
    pub playbook_id: String,
    /// Risk classification
    pub tier: AutonomyTier,
    /// Expected effect, declared before execution
    pub expected_effect: ExpectationMap,
    /// Observable state captured before execution
    pub baseline_state: EffectMap,
    /// Free-text provenance
    pub triggered_by: String,
}

/// Concurrent, append-mostly store of action contracts
#[derive(Debug, Default)]
pub struct ContractStore {
    contracts: DashMap<ContractId, ActionContract>,
}

impl ContractStore {
    /// Create an empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new contract in `Pending`
    ///
    /// # Errors
    /// - `ContractError::EmptyExpectedEffect` if no expectation was declared;
    ///   an unverifiable contract must fail fast rather than score 1.0
    pub fn create(&self, params: CreateContract) -> Result<ActionContract, ContractError> {
        if params.expected_effect.is_empty() {
            return Err(ContractError::EmptyExpectedEffect);
        }

        let now = Utc::now();
        let contract = ActionContract {
            contract_id: ContractId::new(),
            action_type: params.action_type,
            playbook_id: params.playbook_id,
            tier: params.tier,
            triggered_by: params.triggered_by,
            run_id: None,
            expected_effect: params.expected_effect,
            baseline_state: params.baseline_state,
            actual_effect: None,
            confidence_score: None,
            status: ContractStatus::Pending,
            created_at: now,
            history: vec![StatusChange {
                status: ContractStatus::Pending,
                at: now,
            }],
        };

        tracing::debug!(
            contract_id = %contract.contract_id,
            action_type = %contract.action_type,
            tier = contract.tier.value(),
            "contract created"
        );

        self.contracts
            .insert(contract.contract_id, contract.clone());
        Ok(contract)
    }

    /// Transition a contract to a new status
    ///
    /// # Errors
    /// - `ContractError::ContractNotFound` if unknown
    /// - `ContractError::InvalidTransition` if the graph forbids the move
    ///   (terminal contracts forbid every move)
    pub fn transition(&self, id: ContractId, to: ContractStatus) -> Result<(), ContractError> {
        let mut entry = self
            .contracts
            .get_mut(&id)
            .ok_or(ContractError::ContractNotFound(id))?;

        if !entry.status.can_transition_to(to) {
            return Err(ContractError::InvalidTransition {
                contract_id: id,
                from: entry.status,
                to,
            });
        }

        tracing::debug!(contract_id = %id, from = %entry.status, to = %to, "contract transition");
        entry.status = to;
        entry.history.push(StatusChange {
            status: to,
            at: Utc::now(),
        });
        Ok(())
    }

    /// Record the post-execution effect measurement
    ///
    /// # Errors
    /// - `ContractError::ContractNotFound` if unknown
    /// - `ContractError::InvalidTransition` if the contract is already terminal
    /// - `ContractError::ActualAlreadyRecorded` on a second write
    pub fn record_actual(&self, id: ContractId, actual: EffectMap) -> Result<(), ContractError> {
        let mut entry = self
            .contracts
            .get_mut(&id)
            .ok_or(ContractError::ContractNotFound(id))?;

        if entry.status.is_terminal() {
            return Err(ContractError::InvalidTransition {
                contract_id: id,
                from: entry.status,
                to: entry.status,
            });
        }
        if entry.actual_effect.is_some() {
            return Err(ContractError::ActualAlreadyRecorded(id));
        }

        entry.actual_effect = Some(actual);
        Ok(())
    }

    /// Attach the benchmark run correlated with this contract
    ///
    /// # Errors
    /// Returns `ContractError::ContractNotFound` if unknown.
    pub fn set_run_id(&self, id: ContractId, run_id: impl Into<String>) -> Result<(), ContractError> {
        let mut entry = self
            .contracts
            .get_mut(&id)
            .ok_or(ContractError::ContractNotFound(id))?;
        entry.run_id = Some(run_id.into());
        Ok(())
    }

    /// Score the actual effect without touching the status
    ///
    /// Stores the confidence on the contract. Used when the caller already
    /// knows verification cannot pass (e.g. the benchmark failed) but the
    /// confidence must still be recorded for audit and learning.
    ///
    /// # Errors
    /// - `ContractError::ContractNotFound` if unknown
    /// - `ContractError::MissingActualEffect` if nothing was recorded yet
    /// - `ContractError::InvalidTransition` if the contract is already terminal
    pub fn score(&self, id: ContractId) -> Result<Verification, ContractError> {
        let mut entry = self
            .contracts
            .get_mut(&id)
            .ok_or(ContractError::ContractNotFound(id))?;

        if entry.status.is_terminal() {
            return Err(ContractError::InvalidTransition {
                contract_id: id,
                from: entry.status,
                to: ContractStatus::Verified,
            });
        }

        let actual = entry
            .actual_effect
            .as_ref()
            .ok_or(ContractError::MissingActualEffect(id))?;

        let verification = score_effects(&entry.expected_effect, actual);
        entry.confidence_score = Some(verification.confidence);

        if verification.has_instrumentation_gaps() {
            tracing::warn!(
                contract_id = %id,
                gaps = ?verification.instrumentation_gaps,
                "expected keys unreported by instrumentation"
            );
        }

        Ok(verification)
    }

    /// Score the actual effect against the declared expectations
    ///
    /// Stores the confidence on the contract and, when it meets `threshold`,
    /// transitions the contract to `Verified`. A failing score leaves the
    /// status untouched so the caller can plan rollback as an explicit
    /// transition.
    ///
    /// # Errors
    /// - `ContractError::ContractNotFound` if unknown
    /// - `ContractError::MissingActualEffect` if nothing was recorded yet
    /// - `ContractError::InvalidTransition` if the contract is already terminal
    pub fn verify(&self, id: ContractId, threshold: f64) -> Result<Verification, ContractError> {
        let verification = self.score(id)?;

        if verification.passed(threshold) {
            self.transition(id, ContractStatus::Verified)?;
            tracing::info!(
                contract_id = %id,
                confidence = verification.confidence,
                "contract verified"
            );
        } else {
            tracing::warn!(
                contract_id = %id,
                confidence = verification.confidence,
                threshold,
                "verification below threshold"
            );
        }

        Ok(verification)
    }

    /// Get a contract by id
    #[must_use]
    pub fn get(&self, id: ContractId) -> Option<ActionContract> {
        self.contracts.get(&id).map(|c| c.clone())
    }

    /// All contracts, unordered
    #[must_use]
    pub fn all(&self) -> Vec<ActionContract> {
        self.contracts.iter().map(|c| c.clone()).collect()
    }

    /// Contracts belonging to a playbook
    #[must_use]
    pub fn for_playbook(&self, playbook_id: &str) -> Vec<ActionContract> {
        self.contracts
            .iter()
            .filter(|c| c.playbook_id == playbook_id)
            .map(|c| c.clone())
            .collect()
    }

    /// Number of contracts in the store
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    /// Check if the store is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}
