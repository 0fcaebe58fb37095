//! Core contract types
//!
//! Defines the fundamental types of the contract model:
//! - Contract identifiers and autonomy tiers
//! - Tagged expected/observed effect values
//! - The [`ActionContract`] record and its status graph

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unique contract identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContractId(pub Ulid);

impl ContractId {
    /// Generate new contract ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ContractId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ContractId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Autonomy tier: risk classification gating safety overhead
///
/// Tier 1 actions have a negligible blast radius and skip snapshotting.
/// Tier 2 and above must never execute without a rollback point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutonomyTier {
    /// Low risk: no snapshot, smoke benchmark only
    Tier1,
    /// Moderate risk: snapshot required
    Tier2,
    /// High risk: snapshot required, may need approval
    Tier3,
}

impl AutonomyTier {
    /// Get numeric value
    #[inline]
    #[must_use]
    pub fn value(&self) -> u8 {
        match self {
            AutonomyTier::Tier1 => 1,
            AutonomyTier::Tier2 => 2,
            AutonomyTier::Tier3 => 3,
        }
    }

    /// Check if this tier requires a pre-action snapshot
    #[inline]
    #[must_use]
    pub fn requires_snapshot(&self) -> bool {
        self.value() >= 2
    }

    /// Check if this tier runs the full regression suite
    #[inline]
    #[must_use]
    pub fn requires_full_regression(&self) -> bool {
        self.value() >= 2
    }
}

/// A measured observable value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Observed {
    /// Numeric measurement
    Number(f64),
    /// Textual state
    Text(String),
    /// Boolean state
    Bool(bool),
}

impl Observed {
    /// Numeric view, if this is a number
    #[inline]
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Observed::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<f64> for Observed {
    fn from(n: f64) -> Self {
        Observed::Number(n)
    }
}

impl From<&str> for Observed {
    fn from(s: &str) -> Self {
        Observed::Text(s.to_string())
    }
}

impl From<bool> for Observed {
    fn from(b: bool) -> Self {
        Observed::Bool(b)
    }
}

/// A declared expectation for one observable key
///
/// Tagged variants keep verification scoring exhaustive: a numeric
/// expectation can never silently compare against a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    /// Exact string match
    Exact(String),
    /// Boolean match
    Bool(bool),
    /// Numeric value inside an accepted range (either bound optional)
    Range {
        /// Lower bound, inclusive
        min: Option<f64>,
        /// Upper bound, inclusive
        max: Option<f64>,
    },
    /// Numeric value within an absolute tolerance of a target
    Near {
        /// Target value
        value: f64,
        /// Accepted absolute deviation
        tolerance: f64,
    },
}

/// An expectation plus its verification weight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expected {
    /// The declared expectation
    pub expectation: Expectation,
    /// Per-key weight override (equal weights when absent)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

impl Expected {
    /// Exact string expectation
    #[inline]
    #[must_use]
    pub fn exact(value: impl Into<String>) -> Self {
        Self {
            expectation: Expectation::Exact(value.into()),
            weight: None,
        }
    }

    /// Boolean expectation
    #[inline]
    #[must_use]
    pub fn boolean(value: bool) -> Self {
        Self {
            expectation: Expectation::Bool(value),
            weight: None,
        }
    }

    /// Numeric range expectation
    #[inline]
    #[must_use]
    pub fn range(min: f64, max: f64) -> Self {
        Self {
            expectation: Expectation::Range {
                min: Some(min),
                max: Some(max),
            },
            weight: None,
        }
    }

    /// Upper-bounded numeric expectation
    #[inline]
    #[must_use]
    pub fn at_most(max: f64) -> Self {
        Self {
            expectation: Expectation::Range {
                min: None,
                max: Some(max),
            },
            weight: None,
        }
    }

    /// Lower-bounded numeric expectation
    #[inline]
    #[must_use]
    pub fn at_least(min: f64) -> Self {
        Self {
            expectation: Expectation::Range {
                min: Some(min),
                max: None,
            },
            weight: None,
        }
    }

    /// Numeric expectation within tolerance of a target
    #[inline]
    #[must_use]
    pub fn near(value: f64, tolerance: f64) -> Self {
        Self {
            expectation: Expectation::Near { value, tolerance },
            weight: None,
        }
    }

    /// With explicit verification weight
    #[inline]
    #[must_use]
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight.max(0.0));
        self
    }
}

/// Ordered mapping of observable key to declared expectation
pub type ExpectationMap = IndexMap<String, Expected>;

/// Ordered mapping of observable key to measured value
pub type EffectMap = IndexMap<String, Observed>;

/// Contract status (one per state-machine state persisted on the record)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    /// Created, nothing executed yet
    Pending,
    /// Pre-action snapshot captured
    Snapshotted,
    /// Adapter invocation in flight
    Executing,
    /// Post-action benchmark in flight
    Benchmarking,
    /// Confidence met threshold; committed
    Verified,
    /// Low confidence; restored from snapshot
    RolledBack,
    /// Unrecoverable or never executed
    Failed,
}

impl ContractStatus {
    /// Check if this status is terminal
    ///
    /// Terminal contracts are append-only: no further transition is ever
    /// accepted.
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ContractStatus::Verified | ContractStatus::RolledBack | ContractStatus::Failed
        )
    }

    /// Statuses reachable from this one
    #[must_use]
    pub fn allowed_transitions(&self) -> &'static [ContractStatus] {
        use ContractStatus::*;
        match self {
            Pending => &[Snapshotted, Executing, Failed],
            Snapshotted => &[Executing, Failed],
            Executing => &[Benchmarking, RolledBack, Failed],
            Benchmarking => &[Verified, RolledBack, Failed],
            Verified | RolledBack | Failed => &[],
        }
    }

    /// Check whether a transition to `to` is legal
    #[inline]
    #[must_use]
    pub fn can_transition_to(&self, to: ContractStatus) -> bool {
        self.allowed_transitions().contains(&to)
    }
}

impl std::fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ContractStatus::Pending => "pending",
            ContractStatus::Snapshotted => "snapshotted",
            ContractStatus::Executing => "executing",
            ContractStatus::Benchmarking => "benchmarking",
            ContractStatus::Verified => "verified",
            ContractStatus::RolledBack => "rolled_back",
            ContractStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One entry in a contract's append-only status history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChange {
    /// Status entered
    pub status: ContractStatus,
    /// When the transition happened
    pub at: DateTime<Utc>,
}

/// One attempted remediation action
///
/// Created by the executor at action start, mutated only through the
/// [`crate::ContractStore`], never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionContract {
    /// Contract identifier
    pub contract_id: ContractId,
    /// Action type (e.g. "clear_lock", "scale_service")
    pub action_type: String,
    /// Playbook this action belongs to
    pub playbook_id: String,
    /// Risk classification
    pub tier: AutonomyTier,
    /// Free-text provenance (what triggered the action)
    pub triggered_by: String,
    /// Benchmark run correlated with this contract, once one exists
    pub run_id: Option<String>,
    /// Expected effect, declared before execution (never empty)
    pub expected_effect: ExpectationMap,
    /// Observable state captured immediately before execution
    pub baseline_state: EffectMap,
    /// Observable state captured immediately after execution
    pub actual_effect: Option<EffectMap>,
    /// Confidence derived at verification time, in [0, 1]
    pub confidence_score: Option<f64>,
    /// Current status
    pub status: ContractStatus,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Append-only transition history
    pub history: Vec<StatusChange>,
}

impl ActionContract {
    /// Check if the contract has reached a terminal status
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
