//! Progression tracker
//!
//! Owns the mission-level view of multi-step remediations. Step confidence
//! is supplied by the executor at append time; the tracker never reads
//! contract internals.

use crate::types::{Mission, MissionError, MissionId, MissionStatus, MissionStep};
use chrono::Utc;
use dashmap::DashMap;
use remedy_contract::ContractId;
use remedy_safehold::SnapshotId;

/// Smoothing factor: weight retained by the previous rolling confidence
const CONFIDENCE_CARRY: f64 = 0.7;
/// Weight of the newest step's confidence
const CONFIDENCE_STEP: f64 = 0.3;

/// Tracker of mission records
#[derive(Debug)]
pub struct ProgressionTracker {
    missions: DashMap<MissionId, Mission>,
    /// Rolling confidence below which a mission auto-aborts
    abort_threshold: f64,
}

impl ProgressionTracker {
    /// Create a tracker with the default abort threshold (0.5)
    #[must_use]
    pub fn new() -> Self {
        Self {
            missions: DashMap::new(),
            abort_threshold: 0.5,
        }
    }

    /// With an abort threshold override
    #[inline]
    #[must_use]
    pub fn with_abort_threshold(mut self, threshold: f64) -> Self {
        self.abort_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Start a new mission
    pub fn start_mission(&self, goal_description: impl Into<String>) -> Mission {
        let mission = Mission {
            mission_id: MissionId::new(),
            goal_description: goal_description.into(),
            steps: Vec::new(),
            current_confidence: 0.0,
            safe_points: Vec::new(),
            status: MissionStatus::InProgress,
            aborted_reason: None,
            created_at: Utc::now(),
        };
        tracing::info!(
            mission_id = %mission.mission_id,
            goal = %mission.goal_description,
            "mission started"
        );
        self.missions.insert(mission.mission_id, mission.clone());
        mission
    }

    /// Append a completed step and recompute the rolling confidence
    ///
    /// The first step sets the confidence directly; each later step folds in
    /// as `0.7 * previous + 0.3 * step`. A result below the abort threshold
    /// aborts the mission.
    ///
    /// # Errors
    /// - `MissionError::MissionNotFound` if unknown
    /// - `MissionError::MissionTerminal` once completed or aborted
    pub fn append_step(
        &self,
        mission_id: MissionId,
        contract_id: ContractId,
        step_confidence: f64,
    ) -> Result<Mission, MissionError> {
        let mut entry = self
            .missions
            .get_mut(&mission_id)
            .ok_or(MissionError::MissionNotFound(mission_id))?;

        if entry.status.is_terminal() {
            return Err(MissionError::MissionTerminal(mission_id));
        }

        let step_confidence = step_confidence.clamp(0.0, 1.0);
        entry.current_confidence = if entry.steps.is_empty() {
            step_confidence
        } else {
            CONFIDENCE_CARRY * entry.current_confidence + CONFIDENCE_STEP * step_confidence
        };
        entry.steps.push(MissionStep {
            contract_id,
            confidence: step_confidence,
            recorded_at: Utc::now(),
        });

        tracing::debug!(
            %mission_id,
            %contract_id,
            step_confidence,
            rolling = entry.current_confidence,
            "mission step appended"
        );

        if entry.current_confidence < self.abort_threshold {
            entry.status = MissionStatus::Aborted;
            entry.aborted_reason = Some(format!(
                "rolling confidence {:.3} fell below abort threshold {:.3}",
                entry.current_confidence, self.abort_threshold
            ));
            tracing::warn!(
                %mission_id,
                confidence = entry.current_confidence,
                threshold = self.abort_threshold,
                "mission aborted on confidence collapse"
            );
        }

        Ok(entry.clone())
    }

    /// Mark a snapshot as a mission-level rollback target
    ///
    /// # Errors
    /// - `MissionError::MissionNotFound` if unknown
    /// - `MissionError::MissionTerminal` once completed or aborted
    pub fn mark_safe_point(
        &self,
        mission_id: MissionId,
        snapshot_id: SnapshotId,
    ) -> Result<(), MissionError> {
        let mut entry = self
            .missions
            .get_mut(&mission_id)
            .ok_or(MissionError::MissionNotFound(mission_id))?;
        if entry.status.is_terminal() {
            return Err(MissionError::MissionTerminal(mission_id));
        }
        entry.safe_points.push(snapshot_id);
        tracing::debug!(%mission_id, %snapshot_id, "safe point marked");
        Ok(())
    }

    /// Abort a mission; terminal
    ///
    /// # Errors
    /// - `MissionError::MissionNotFound` if unknown
    /// - `MissionError::MissionTerminal` if already terminal
    pub fn abort(&self, mission_id: MissionId, reason: impl Into<String>) -> Result<(), MissionError> {
        let mut entry = self
            .missions
            .get_mut(&mission_id)
            .ok_or(MissionError::MissionNotFound(mission_id))?;
        if entry.status.is_terminal() {
            return Err(MissionError::MissionTerminal(mission_id));
        }
        let reason = reason.into();
        tracing::warn!(%mission_id, %reason, "mission aborted");
        entry.status = MissionStatus::Aborted;
        entry.aborted_reason = Some(reason);
        Ok(())
    }

    /// Complete a mission; terminal success
    ///
    /// # Errors
    /// - `MissionError::MissionNotFound` if unknown
    /// - `MissionError::MissionTerminal` if already terminal
    pub fn complete(&self, mission_id: MissionId) -> Result<(), MissionError> {
        let mut entry = self
            .missions
            .get_mut(&mission_id)
            .ok_or(MissionError::MissionNotFound(mission_id))?;
        if entry.status.is_terminal() {
            return Err(MissionError::MissionTerminal(mission_id));
        }
        tracing::info!(%mission_id, confidence = entry.current_confidence, "mission completed");
        entry.status = MissionStatus::Completed;
        Ok(())
    }

    /// Get a mission by id
    #[must_use]
    pub fn get(&self, mission_id: MissionId) -> Option<Mission> {
        self.missions.get(&mission_id).map(|m| m.clone())
    }

    /// Missions still in progress
    #[must_use]
    pub fn in_progress(&self) -> Vec<Mission> {
        self.missions
            .iter()
            .filter(|m| m.status == MissionStatus::InProgress)
            .map(|m| m.clone())
            .collect()
    }
}

impl Default for ProgressionTracker {
    fn default() -> Self {
        Self::new()
    }
}
