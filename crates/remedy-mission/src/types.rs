//! Mission record types

use chrono::{DateTime, Utc};
use remedy_contract::ContractId;
use remedy_safehold::SnapshotId;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unique mission identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MissionId(pub Ulid);

impl MissionId {
    /// Generate new mission ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for MissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MissionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Mission lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionStatus {
    /// Steps still being appended
    InProgress,
    /// Last step verified; terminal success
    Completed,
    /// Rollback failure or confidence collapse; terminal, not resumable
    Aborted,
}

impl MissionStatus {
    /// Check if this status is terminal
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, MissionStatus::Completed | MissionStatus::Aborted)
    }
}

/// One completed step in a mission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionStep {
    /// Contract this step executed
    pub contract_id: ContractId,
    /// The step's verification confidence
    pub confidence: f64,
    /// When the step was recorded
    pub recorded_at: DateTime<Utc>,
}

/// An ordered sequence of contracts pursuing one remediation goal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mission {
    /// Mission identifier
    pub mission_id: MissionId,
    /// What the mission is trying to achieve
    pub goal_description: String,
    /// Completed steps, in execution order
    pub steps: Vec<MissionStep>,
    /// Exponentially-weighted rolling confidence over the steps
    pub current_confidence: f64,
    /// Mission-level rollback targets, in the order they were marked
    pub safe_points: Vec<SnapshotId>,
    /// Lifecycle status
    pub status: MissionStatus,
    /// Why the mission aborted, when it did
    pub aborted_reason: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Mission {
    /// The most recently marked safe point, if any
    ///
    /// An aborted mission cannot be resumed; a successor mission starts from
    /// this snapshot.
    #[inline]
    #[must_use]
    pub fn last_safe_point(&self) -> Option<SnapshotId> {
        self.safe_points.last().copied()
    }
}

/// Progression tracker errors
#[derive(Debug, thiserror::Error)]
pub enum MissionError {
    /// Unknown mission id
    #[error("mission not found: {0}")]
    MissionNotFound(MissionId),

    /// Completed and aborted missions accept no further mutation
    #[error("mission {0} is terminal")]
    MissionTerminal(MissionId),
}
