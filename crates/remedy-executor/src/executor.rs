//! Verified action execution
//!
//! [`ActionExecutor::execute_verified_action`] drives one contract through
//! the full pipeline: governance, snapshot, adapter, benchmark, verification
//! and — when verification fails — rollback. Every path ends in a terminal
//! contract status, a signed audit event and a learning outcome.

use crate::adapter::{perform_with_retry, ActionAdapter};
use crate::audit::{AuditRecord, AuditSink};
use crate::cancel::CancelToken;
use crate::config::ExecutorConfig;
use crate::error::ExecutorError;
use crate::governance::{Authorization, GovernanceGate};
use crate::learning::{LearningCollector, NullCollector, OutcomeEvent};
use crate::locks::ResourceLocks;
use chrono::Utc;
use remedy_benchmark::{BenchmarkEngine, SuiteType};
use remedy_contract::{
    AutonomyTier, ContractId, ContractStatus, ContractStore, CreateContract, EffectMap,
    ExpectationMap,
};
use remedy_mission::{MissionId, MissionStatus, ProgressionTracker};
use remedy_safehold::{SafeHoldManager, SnapshotId, SnapshotKind};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

/// A request to execute one remediation action under contract
#[derive(Debug, Clone)]
pub struct ActionRequest {
    /// Action type (e.g. "clear_lock")
    pub action_type: String,
    /// Owning playbook
    pub playbook_id: String,
    /// Risk classification
    pub tier: AutonomyTier,
    /// Resource the action mutates; actions on the same resource serialize
    pub resource_id: String,
    /// Expected effect, declared before execution
    pub expected_effect: ExpectationMap,
    /// Observable state captured before execution
    pub baseline_state: EffectMap,
    /// Opaque adapter parameters
    pub parameters: serde_json::Value,
    /// Free-text provenance
    pub triggered_by: String,
    /// Owning mission, when the action is a mission step
    pub mission_id: Option<MissionId>,
    /// Pre-execution cancellation handle
    pub cancel: Option<CancelToken>,
}

impl ActionRequest {
    /// Create a request with empty effect maps and no mission
    #[must_use]
    pub fn new(
        action_type: impl Into<String>,
        playbook_id: impl Into<String>,
        tier: AutonomyTier,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            action_type: action_type.into(),
            playbook_id: playbook_id.into(),
            tier,
            resource_id: resource_id.into(),
            expected_effect: ExpectationMap::new(),
            baseline_state: EffectMap::new(),
            parameters: serde_json::Value::Null,
            triggered_by: String::new(),
            mission_id: None,
            cancel: None,
        }
    }

    /// With the declared expected effect
    #[must_use]
    pub fn with_expected_effect(mut self, expected: ExpectationMap) -> Self {
        self.expected_effect = expected;
        self
    }

    /// With the pre-execution baseline state
    #[must_use]
    pub fn with_baseline_state(mut self, baseline: EffectMap) -> Self {
        self.baseline_state = baseline;
        self
    }

    /// With adapter parameters
    #[must_use]
    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = parameters;
        self
    }

    /// With provenance
    #[must_use]
    pub fn with_triggered_by(mut self, triggered_by: impl Into<String>) -> Self {
        self.triggered_by = triggered_by.into();
        self
    }

    /// As a step of a mission
    #[must_use]
    pub fn with_mission(mut self, mission_id: MissionId) -> Self {
        self.mission_id = Some(mission_id);
        self
    }

    /// With a cancellation handle
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Terminal disposition of an executed action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    /// Contract verified; the effect held and benchmarks stayed healthy
    Success,
    /// Verification failed and the pre-action snapshot was restored
    RolledBack,
    /// The action failed without a clean rollback; needs human attention
    Failed,
}

/// Result of one verified action execution
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    /// Contract driven through the pipeline
    pub contract_id: ContractId,
    /// Terminal disposition
    pub status: OutcomeStatus,
    /// Final verification confidence (0.0 when never scored)
    pub confidence: f64,
    /// Pre-action snapshot, when one was captured
    pub snapshot_id: Option<SnapshotId>,
    /// Wall-clock duration of the whole pipeline
    pub duration_ms: u64,
    /// Short context for non-success outcomes
    pub context: String,
}

impl ActionOutcome {
    /// True when the outcome left the resource in an unverified state
    #[inline]
    #[must_use]
    pub fn requires_human_attention(&self) -> bool {
        self.status == OutcomeStatus::Failed
    }
}

/// How the pipeline itself concluded, before finalization
enum Verdict {
    Verified {
        confidence: f64,
    },
    RolledBack {
        confidence: f64,
        context: String,
    },
    /// Verification failed with no rollback point (tier 1 only)
    Failed {
        confidence: f64,
        context: String,
    },
}

/// Orchestrator for verified self-healing actions
pub struct ActionExecutor {
    contracts: Arc<ContractStore>,
    safehold: Arc<SafeHoldManager>,
    benchmarks: Arc<BenchmarkEngine>,
    missions: Arc<ProgressionTracker>,
    adapter: Arc<dyn ActionAdapter>,
    governance: Arc<dyn GovernanceGate>,
    audit: Arc<dyn AuditSink>,
    learning: Arc<dyn LearningCollector>,
    locks: ResourceLocks,
    permits: Arc<Semaphore>,
    config: ExecutorConfig,
}

impl ActionExecutor {
    /// Create an executor over its collaborators with the default config
    #[must_use]
    pub fn new(
        contracts: Arc<ContractStore>,
        safehold: Arc<SafeHoldManager>,
        benchmarks: Arc<BenchmarkEngine>,
        missions: Arc<ProgressionTracker>,
        adapter: Arc<dyn ActionAdapter>,
        governance: Arc<dyn GovernanceGate>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let config = ExecutorConfig::default();
        Self {
            contracts,
            safehold,
            benchmarks,
            missions,
            adapter,
            governance,
            audit,
            learning: Arc::new(NullCollector),
            locks: ResourceLocks::new(),
            permits: Arc::new(Semaphore::new(config.max_concurrent_actions)),
            config,
        }
    }

    /// With a learning collector
    #[must_use]
    pub fn with_learning(mut self, learning: Arc<dyn LearningCollector>) -> Self {
        self.learning = learning;
        self
    }

    /// With a config override; resizes the concurrency pool
    #[must_use]
    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.permits = Arc::new(Semaphore::new(config.max_concurrent_actions));
        self.config = config;
        self
    }

    /// The contract store this executor writes to
    #[inline]
    #[must_use]
    pub fn contracts(&self) -> &Arc<ContractStore> {
        &self.contracts
    }

    /// Execute one action under contract, to a terminal status
    ///
    /// Non-success dispositions (rollback, failure, denial, cancellation) are
    /// reported in-band as the [`ActionOutcome`]; an `Err` means no contract
    /// outcome was produced at all.
    ///
    /// # Errors
    /// - `ExecutorError::Contract` when the request declares no expected
    ///   effect
    /// - `ExecutorError::Shutdown` when the executor pool is closed
    pub async fn execute_verified_action(
        &self,
        request: ActionRequest,
    ) -> Result<ActionOutcome, ExecutorError> {
        let started = Instant::now();

        let contract = self.contracts.create(CreateContract {
            action_type: request.action_type.clone(),
            playbook_id: request.playbook_id.clone(),
            tier: request.tier,
            expected_effect: request.expected_effect.clone(),
            baseline_state: request.baseline_state.clone(),
            triggered_by: request.triggered_by.clone(),
        })?;
        let id = contract.contract_id;

        let _permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ExecutorError::Shutdown)?;
        let _resource_guard = self.locks.acquire(&request.resource_id).await;

        let verdict = self.run_pipeline(id, &request).await;

        let (status, confidence, context, rollback_failed) = match verdict {
            Ok(Verdict::Verified { confidence }) => {
                (OutcomeStatus::Success, confidence, String::new(), false)
            }
            Ok(Verdict::RolledBack {
                confidence,
                context,
            }) => (OutcomeStatus::RolledBack, confidence, context, false),
            Ok(Verdict::Failed {
                confidence,
                context,
            }) => (OutcomeStatus::Failed, confidence, context, false),
            Err(err) => {
                let rollback_failed = matches!(err, ExecutorError::RollbackFailed { .. });
                self.fail_contract(id, &err);
                let confidence = self
                    .contracts
                    .get(id)
                    .and_then(|c| c.confidence_score)
                    .unwrap_or(0.0);
                (OutcomeStatus::Failed, confidence, err.to_string(), rollback_failed)
            }
        };

        let snapshot_id = self.safehold.pre_action_for(id).map(|s| s.snapshot_id);
        let outcome = ActionOutcome {
            contract_id: id,
            status,
            confidence,
            snapshot_id,
            duration_ms: started.elapsed().as_millis() as u64,
            context,
        };
        self.finalize(&request, &outcome, rollback_failed);
        Ok(outcome)
    }

    /// Drive the contract from `Pending` to a terminal status
    async fn run_pipeline(
        &self,
        id: ContractId,
        request: &ActionRequest,
    ) -> Result<Verdict, ExecutorError> {
        self.authorize(id, request).await?;

        if request.tier.requires_snapshot() {
            tokio::time::timeout(
                self.config.snapshot_timeout,
                self.safehold
                    .snapshot(&request.resource_id, Some(id), SnapshotKind::PreAction),
            )
            .await
            .map_err(|_| ExecutorError::Timeout {
                phase: "snapshot",
                contract_id: id,
            })??;
            self.contracts.transition(id, ContractStatus::Snapshotted)?;
        }

        // Cancellation is honored only up to this point; once the adapter
        // runs, the pipeline must reach a terminal status.
        if let Some(cancel) = &request.cancel {
            if cancel.is_cancelled() {
                return Err(ExecutorError::Cancelled(id));
            }
        }

        self.contracts.transition(id, ContractStatus::Executing)?;
        let actual = match perform_with_retry(
            self.adapter.as_ref(),
            &request.action_type,
            &request.parameters,
            &self.config.retry,
        )
        .await
        {
            Ok(actual) => actual,
            Err(source) => {
                if self.safehold.pre_action_for(id).is_some() {
                    return self
                        .roll_back(id, 0.0, format!("adapter failed: {source}"))
                        .await;
                }
                return Err(ExecutorError::Adapter {
                    contract_id: id,
                    source,
                });
            }
        };
        self.contracts.record_actual(id, actual)?;
        self.contracts.transition(id, ContractStatus::Benchmarking)?;

        let suite = SuiteType::for_tier(request.tier);
        let run = self
            .benchmarks
            .run(id, suite, &request.baseline_state)
            .await;
        self.contracts.set_run_id(id, run.run_id.to_string())?;

        if run.passed {
            let verification = self.contracts.verify(id, self.config.confidence_threshold)?;
            if verification.passed(self.config.confidence_threshold) {
                return Ok(Verdict::Verified {
                    confidence: verification.confidence,
                });
            }
            self.roll_back(
                id,
                verification.confidence,
                format!(
                    "confidence {:.3} below threshold {:.3}",
                    verification.confidence, self.config.confidence_threshold
                ),
            )
            .await
        } else {
            // Benchmark drift or missing evidence: record the confidence for
            // audit but never let a high score commit the contract.
            let verification = self.contracts.score(id)?;
            self.roll_back(
                id,
                verification.confidence,
                format!(
                    "benchmark {} failed: drift {:.1}%, {} missing metric(s)",
                    suite,
                    run.drift_percentage,
                    run.missing_metrics.len()
                ),
            )
            .await
        }
    }

    /// Governance check, with a bounded approval wait
    async fn authorize(&self, id: ContractId, request: &ActionRequest) -> Result<(), ExecutorError> {
        match self
            .governance
            .authorize(&request.action_type, request.tier, &request.resource_id)
            .await
        {
            Authorization::Allow => Ok(()),
            Authorization::Deny { reason } => Err(ExecutorError::Denied { reason }),
            Authorization::RequireApproval => {
                tracing::info!(contract_id = %id, action_type = %request.action_type, "awaiting approval");
                let approved = tokio::time::timeout(
                    self.config.approval_timeout,
                    self.governance.await_approval(id),
                )
                .await
                .map_err(|_| ExecutorError::ApprovalTimeout(id))?;
                if approved {
                    Ok(())
                } else {
                    Err(ExecutorError::Denied {
                        reason: "approval refused".to_string(),
                    })
                }
            }
        }
    }

    /// Restore the pre-action snapshot if one exists, else fail the contract
    ///
    /// A restore failure is escalated as `RollbackFailed`: the resource is in
    /// an unknown state and automation must stop touching it.
    async fn roll_back(
        &self,
        id: ContractId,
        confidence: f64,
        context: String,
    ) -> Result<Verdict, ExecutorError> {
        let Some(snapshot) = self.safehold.pre_action_for(id) else {
            self.contracts.transition(id, ContractStatus::Failed)?;
            tracing::warn!(contract_id = %id, %context, "failed without rollback point");
            return Ok(Verdict::Failed {
                confidence,
                context,
            });
        };

        let restore = tokio::time::timeout(
            self.config.restore_timeout,
            self.safehold.restore(snapshot.snapshot_id),
        )
        .await;
        match restore {
            Ok(Ok(())) => {
                self.contracts.transition(id, ContractStatus::RolledBack)?;
                tracing::info!(
                    contract_id = %id,
                    snapshot_id = %snapshot.snapshot_id,
                    %context,
                    "action rolled back"
                );
                Ok(Verdict::RolledBack {
                    confidence,
                    context,
                })
            }
            Ok(Err(err)) => Err(ExecutorError::RollbackFailed {
                contract_id: id,
                reason: err.to_string(),
            }),
            Err(_) => Err(ExecutorError::RollbackFailed {
                contract_id: id,
                reason: format!(
                    "restore exceeded {} ms",
                    self.config.restore_timeout.as_millis()
                ),
            }),
        }
    }

    /// Force the contract to `Failed` after a pipeline error
    fn fail_contract(&self, id: ContractId, err: &ExecutorError) {
        let Some(contract) = self.contracts.get(id) else {
            return;
        };
        if contract.status.is_terminal() {
            return;
        }
        tracing::error!(contract_id = %id, %err, "pipeline failed");
        if let Err(transition_err) = self.contracts.transition(id, ContractStatus::Failed) {
            tracing::error!(contract_id = %id, %transition_err, "could not mark contract failed");
        }
    }

    /// Audit, learning and mission bookkeeping for a terminal outcome.
    ///
    /// A step whose rollback failed leaves the resource in an unknown state,
    /// so the owning mission is aborted outright rather than left to the
    /// rolling-confidence threshold.
    fn finalize(&self, request: &ActionRequest, outcome: &ActionOutcome, rollback_failed: bool) {
        let status = self
            .contracts
            .get(outcome.contract_id)
            .map(|c| c.status)
            .unwrap_or(ContractStatus::Failed);

        self.audit.append(AuditRecord {
            contract_id: outcome.contract_id,
            status,
            confidence: outcome.confidence,
            timestamp: Utc::now(),
            context: outcome.context.clone(),
        });

        self.learning.record(OutcomeEvent {
            playbook_id: request.playbook_id.clone(),
            action_type: request.action_type.clone(),
            tier: request.tier,
            success: outcome.status == OutcomeStatus::Success,
            confidence: outcome.confidence,
            duration_ms: outcome.duration_ms,
            mission_id: request.mission_id,
        });

        if let Some(mission_id) = request.mission_id {
            let mission = match self
                .missions
                .append_step(mission_id, outcome.contract_id, outcome.confidence)
            {
                Ok(mission) => mission,
                Err(err) => {
                    tracing::warn!(%mission_id, %err, "mission step not recorded");
                    return;
                }
            };
            if rollback_failed && mission.status == MissionStatus::InProgress {
                let reason = format!("rollback failed for contract {}", outcome.contract_id);
                if let Err(err) = self.missions.abort(mission_id, reason) {
                    tracing::warn!(%mission_id, %err, "mission abort not recorded");
                }
            } else if outcome.status == OutcomeStatus::Success {
                if let Some(snapshot_id) = outcome.snapshot_id {
                    if let Err(err) = self.missions.mark_safe_point(mission_id, snapshot_id) {
                        tracing::warn!(%mission_id, %err, "safe point not recorded");
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for ActionExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionExecutor")
            .field("contracts", &self.contracts.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
