//! Governance gate interface
//!
//! The tier/policy engine that decides whether an action may run lives
//! outside the core. When it demands approval, the executor halts in
//! `Pending` and awaits the external signal; this is the only
//! externally-injected pause point in the state machine.

use remedy_contract::{AutonomyTier, ContractId};

/// Authorization decision for an action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    /// Proceed immediately
    Allow,
    /// Refuse; the action fails without executing
    Deny {
        /// Why the action was refused
        reason: String,
    },
    /// Halt until an external approval signal arrives
    RequireApproval,
}

/// Pluggable governance/tier gate
#[async_trait::async_trait]
pub trait GovernanceGate: Send + Sync {
    /// Decide whether an action may run
    ///
    /// `blast_radius` describes what the action can damage. The executor
    /// passes the target resource id; richer deployments may encode a
    /// service or fleet scope.
    async fn authorize(
        &self,
        action_type: &str,
        tier: AutonomyTier,
        blast_radius: &str,
    ) -> Authorization;

    /// Wait for the external approval signal for a halted contract
    ///
    /// Returns true when approved. The executor bounds this wait with its
    /// configured approval timeout.
    async fn await_approval(&self, contract_id: ContractId) -> bool;
}
