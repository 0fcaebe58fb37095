//! Learning collector interface
//!
//! Outcome records feed the external learning pipeline that tunes playbook
//! selection. Emission is best-effort: the collector owns retries, and the
//! executor never blocks on it.

use remedy_contract::AutonomyTier;
use remedy_mission::MissionId;
use serde::{Deserialize, Serialize};

/// One action outcome, as consumed by the learning pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeEvent {
    /// Playbook the action belonged to
    pub playbook_id: String,
    /// Action type performed
    pub action_type: String,
    /// Risk tier
    pub tier: AutonomyTier,
    /// True only for verified outcomes
    pub success: bool,
    /// Verification confidence
    pub confidence: f64,
    /// Wall-clock duration of the whole state machine
    pub duration_ms: u64,
    /// Owning mission, when the action was a mission step
    pub mission_id: Option<MissionId>,
}

/// Outcome consumer
pub trait LearningCollector: Send + Sync {
    /// Record an outcome; must never block or fail the caller
    fn record(&self, event: OutcomeEvent);
}

/// Collector that drops everything; for deployments without a learning
/// pipeline
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCollector;

impl LearningCollector for NullCollector {
    fn record(&self, _event: OutcomeEvent) {}
}
