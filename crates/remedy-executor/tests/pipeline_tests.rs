//! End-to-end pipeline tests
//!
//! Each test drives [`ActionExecutor::execute_verified_action`] through a
//! full scenario over in-memory fakes and inspects the terminal contract,
//! snapshot, audit, learning and mission state.

use indexmap::{indexmap, IndexMap};
use remedy_benchmark::{BenchmarkConfig, BenchmarkEngine, SuiteConfig};
use remedy_contract::{
    AutonomyTier, ContractStatus, ContractStore, EffectMap, Expected, Observed,
};
use remedy_executor::{
    ActionAdapter, ActionExecutor, ActionRequest, AdapterError, AuditSink, ExecutorConfig,
    GovernanceGate, OutcomeStatus, SignedAuditLog,
};
use remedy_mission::{MissionStatus, ProgressionTracker};
use remedy_safehold::SafeHoldManager;
use pretty_assertions::assert_eq;
use remedy_test_utils::{
    AllowAllGate, ApprovalGate, DenyAllGate, MemoryStorageBackend, RecordingAuditSink,
    RecordingCollector, ScriptedAdapter, StaticProbe,
};
use std::sync::Arc;
use std::time::Duration;

const RESOURCE: &str = "db-primary";

struct Harness {
    backend: Arc<MemoryStorageBackend>,
    contracts: Arc<ContractStore>,
    missions: Arc<ProgressionTracker>,
    audit: Arc<RecordingAuditSink>,
    learning: Arc<RecordingCollector>,
    executor: ActionExecutor,
}

fn healthy_metrics() -> IndexMap<String, f64> {
    indexmap! {
        "error_rate".to_string() => 0.01,
        "latency_p50_ms".to_string() => 100.0,
    }
}

fn benchmark_config() -> BenchmarkConfig {
    let suite = SuiteConfig::new(vec![
        "error_rate".to_string(),
        "latency_p50_ms".to_string(),
    ]);
    BenchmarkConfig {
        smoke: suite.clone(),
        full_regression: suite,
    }
}

fn build(
    adapter: Arc<dyn ActionAdapter>,
    gate: Arc<dyn GovernanceGate>,
    metrics: IndexMap<String, f64>,
    config: ExecutorConfig,
) -> Harness {
    remedy_test_utils::init_test_tracing();
    let backend = Arc::new(MemoryStorageBackend::with_resource(RESOURCE, b"known-good"));
    let contracts = Arc::new(ContractStore::new());
    let safehold = Arc::new(SafeHoldManager::new(backend.clone()));
    let benchmarks = Arc::new(BenchmarkEngine::new(
        Arc::new(StaticProbe::returning(metrics)),
        benchmark_config(),
    ));
    let missions = Arc::new(ProgressionTracker::new());
    let audit = Arc::new(RecordingAuditSink::new());
    let learning = Arc::new(RecordingCollector::new());

    let executor = ActionExecutor::new(
        contracts.clone(),
        safehold,
        benchmarks,
        missions.clone(),
        adapter,
        gate,
        audit.clone(),
    )
    .with_learning(learning.clone())
    .with_config(config);

    Harness {
        backend,
        contracts,
        missions,
        audit,
        learning,
        executor,
    }
}

fn build_default(adapter: Arc<dyn ActionAdapter>) -> Harness {
    build(
        adapter,
        Arc::new(AllowAllGate),
        healthy_metrics(),
        ExecutorConfig::default(),
    )
}

fn clear_lock_request() -> ActionRequest {
    ActionRequest::new("clear_lock", "pb-db-locks", AutonomyTier::Tier2, RESOURCE)
        .with_expected_effect(indexmap! {
            "lock_state".to_string() => Expected::exact("released"),
        })
        .with_baseline_state(indexmap! {
            "error_rate".to_string() => Observed::from(0.01),
            "latency_p50_ms".to_string() => Observed::from(100.0),
        })
        .with_triggered_by("triage:lock-wait-timeout")
}

fn released_effect() -> EffectMap {
    indexmap! { "lock_state".to_string() => Observed::from("released") }
}

#[tokio::test]
async fn successful_action_verifies_and_audits() {
    let harness = build_default(Arc::new(ScriptedAdapter::returning(released_effect())));

    let outcome = harness
        .executor
        .execute_verified_action(clear_lock_request())
        .await
        .unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Success);
    assert!((outcome.confidence - 1.0).abs() < f64::EPSILON);
    assert!(outcome.snapshot_id.is_some());

    let contract = harness.contracts.get(outcome.contract_id).unwrap();
    assert_eq!(contract.status, ContractStatus::Verified);
    assert!(contract.run_id.is_some());
    // Snapshot captured but never restored
    assert_eq!(harness.backend.restore_count(), 0);

    let audit = harness.audit.records();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].status, ContractStatus::Verified);

    let events = harness.learning.events();
    assert_eq!(events.len(), 1);
    assert!(events[0].success);
    assert_eq!(events[0].playbook_id, "pb-db-locks");
}

#[tokio::test]
async fn out_of_range_effect_rolls_back() {
    // Expected: lock wait under 200ms. Adapter reports 450ms, which decays
    // past the bound to a floor of zero.
    let adapter = Arc::new(ScriptedAdapter::returning(indexmap! {
        "lock_wait_ms".to_string() => Observed::from(450.0),
    }));
    let harness = build_default(adapter);

    let request = clear_lock_request().with_expected_effect(indexmap! {
        "lock_wait_ms".to_string() => Expected::at_most(200.0),
    });
    let outcome = harness
        .executor
        .execute_verified_action(request)
        .await
        .unwrap();

    assert_eq!(outcome.status, OutcomeStatus::RolledBack);
    assert_eq!(outcome.confidence, 0.0);
    assert!(outcome.context.contains("below threshold"));
    assert_eq!(harness.backend.restore_count(), 1);

    let contract = harness.contracts.get(outcome.contract_id).unwrap();
    assert_eq!(contract.status, ContractStatus::RolledBack);
    assert_eq!(contract.confidence_score, Some(0.0));

    assert!(!harness.learning.events()[0].success);
}

#[tokio::test]
async fn snapshot_failure_blocks_execution() {
    // Backend down before anything starts: the adapter must never run for a
    // tier >= 2 action without a rollback point.
    let adapter = Arc::new(ScriptedAdapter::returning(released_effect()));
    let harness = build_default(adapter.clone());
    harness.backend.set_unavailable(true);

    let mut request = clear_lock_request();
    request.tier = AutonomyTier::Tier3;
    let outcome = harness
        .executor
        .execute_verified_action(request)
        .await
        .unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert!(outcome.requires_human_attention());
    assert!(outcome.snapshot_id.is_none());
    assert_eq!(adapter.calls(), 0);

    let contract = harness.contracts.get(outcome.contract_id).unwrap();
    assert_eq!(contract.status, ContractStatus::Failed);
    assert!(contract.actual_effect.is_none());
}

#[tokio::test]
async fn benchmark_drift_overrides_matching_effect() {
    // The declared effect holds perfectly, but error rate has quintupled
    // against the baseline. Drift wins: the action rolls back.
    let degraded = indexmap! {
        "error_rate".to_string() => 0.05,
        "latency_p50_ms".to_string() => 100.0,
    };
    let harness = build(
        Arc::new(ScriptedAdapter::returning(released_effect())),
        Arc::new(AllowAllGate),
        degraded,
        ExecutorConfig::default(),
    );

    let outcome = harness
        .executor
        .execute_verified_action(clear_lock_request())
        .await
        .unwrap();

    assert_eq!(outcome.status, OutcomeStatus::RolledBack);
    // Confidence was recorded for audit even though the benchmark failed
    assert!((outcome.confidence - 1.0).abs() < f64::EPSILON);
    assert!(outcome.context.contains("benchmark"));

    let contract = harness.contracts.get(outcome.contract_id).unwrap();
    assert_eq!(contract.status, ContractStatus::RolledBack);
    assert_eq!(contract.confidence_score, Some(1.0));
    assert_eq!(harness.backend.restore_count(), 1);
}

#[tokio::test]
async fn denied_action_fails_without_executing() {
    let adapter = Arc::new(ScriptedAdapter::returning(released_effect()));
    let harness = build(
        adapter.clone(),
        Arc::new(DenyAllGate::new("tier 3 frozen during incident")),
        healthy_metrics(),
        ExecutorConfig::default(),
    );

    let outcome = harness
        .executor
        .execute_verified_action(clear_lock_request())
        .await
        .unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert!(outcome.context.contains("tier 3 frozen"));
    assert_eq!(adapter.calls(), 0);
    assert!(outcome.snapshot_id.is_none());
}

#[tokio::test]
async fn approval_gate_allows_after_signal() {
    let harness = build(
        Arc::new(ScriptedAdapter::returning(released_effect())),
        Arc::new(ApprovalGate::approving()),
        healthy_metrics(),
        ExecutorConfig::default(),
    );

    let outcome = harness
        .executor
        .execute_verified_action(clear_lock_request())
        .await
        .unwrap();
    assert_eq!(outcome.status, OutcomeStatus::Success);
}

#[tokio::test]
async fn approval_timeout_fails_the_action() {
    let adapter = Arc::new(ScriptedAdapter::returning(released_effect()));
    let harness = build(
        adapter.clone(),
        Arc::new(ApprovalGate::approving_after(Duration::from_secs(60))),
        healthy_metrics(),
        ExecutorConfig::default().with_approval_timeout(Duration::from_millis(20)),
    );

    let outcome = harness
        .executor
        .execute_verified_action(clear_lock_request())
        .await
        .unwrap();
    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert!(outcome.context.contains("timed out"));
    assert_eq!(adapter.calls(), 0);
}

#[tokio::test]
async fn transient_adapter_errors_are_retried_to_success() {
    let adapter = Arc::new(ScriptedAdapter::transient_then_success(
        2,
        released_effect(),
    ));
    let harness = build_default(adapter.clone());

    let outcome = harness
        .executor
        .execute_verified_action(clear_lock_request())
        .await
        .unwrap();
    assert_eq!(outcome.status, OutcomeStatus::Success);
    assert_eq!(adapter.calls(), 3);
}

#[tokio::test]
async fn permanent_adapter_error_rolls_back() {
    let adapter = Arc::new(ScriptedAdapter::failing_permanent("playbook misconfigured"));
    let harness = build_default(adapter.clone());

    let outcome = harness
        .executor
        .execute_verified_action(clear_lock_request())
        .await
        .unwrap();

    assert_eq!(outcome.status, OutcomeStatus::RolledBack);
    assert_eq!(adapter.calls(), 1);
    assert!(outcome.context.contains("adapter failed"));
    assert_eq!(harness.backend.restore_count(), 1);
}

/// Adapter that takes the storage backend down as a side effect, so the
/// later rollback attempt fails
struct SabotagingAdapter {
    backend: Arc<MemoryStorageBackend>,
}

#[async_trait::async_trait]
impl ActionAdapter for SabotagingAdapter {
    async fn perform(
        &self,
        _action_type: &str,
        _parameters: &serde_json::Value,
    ) -> Result<EffectMap, AdapterError> {
        self.backend.set_unavailable(true);
        // Reported effect will not satisfy the expectation
        Ok(indexmap! { "lock_state".to_string() => Observed::from("stuck") })
    }
}

#[tokio::test]
async fn failed_rollback_escalates() {
    let backend = Arc::new(MemoryStorageBackend::with_resource(RESOURCE, b"known-good"));
    let contracts = Arc::new(ContractStore::new());
    let executor = ActionExecutor::new(
        contracts.clone(),
        Arc::new(SafeHoldManager::new(backend.clone())),
        Arc::new(BenchmarkEngine::new(
            Arc::new(StaticProbe::returning(healthy_metrics())),
            benchmark_config(),
        )),
        Arc::new(ProgressionTracker::new()),
        Arc::new(SabotagingAdapter { backend }),
        Arc::new(AllowAllGate),
        Arc::new(RecordingAuditSink::new()),
    );

    let outcome = executor
        .execute_verified_action(clear_lock_request())
        .await
        .unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert!(outcome.requires_human_attention());
    assert!(outcome.context.contains("rollback failed"));

    let contract = contracts.get(outcome.contract_id).unwrap();
    assert_eq!(contract.status, ContractStatus::Failed);
}

#[tokio::test]
async fn rollback_failure_aborts_the_mission() {
    // Two clean steps keep rolling confidence at 1.0, then a step whose
    // rollback fails strands the resource. Smoothing alone would leave the
    // mission in progress at 0.7; it must abort outright instead.
    let harness = build_default(Arc::new(ScriptedAdapter::returning(released_effect())));
    let mission = harness.missions.start_mission("rotate credentials");

    for _ in 0..2 {
        let outcome = harness
            .executor
            .execute_verified_action(clear_lock_request().with_mission(mission.mission_id))
            .await
            .unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Success);
    }

    let backend = Arc::new(MemoryStorageBackend::with_resource(RESOURCE, b"known-good"));
    let stranding_executor = ActionExecutor::new(
        harness.contracts.clone(),
        Arc::new(SafeHoldManager::new(backend.clone())),
        Arc::new(BenchmarkEngine::new(
            Arc::new(StaticProbe::returning(healthy_metrics())),
            benchmark_config(),
        )),
        harness.missions.clone(),
        Arc::new(SabotagingAdapter { backend }),
        Arc::new(AllowAllGate),
        Arc::new(RecordingAuditSink::new()),
    );

    let outcome = stranding_executor
        .execute_verified_action(clear_lock_request().with_mission(mission.mission_id))
        .await
        .unwrap();
    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert!(outcome.requires_human_attention());

    let mission = harness.missions.get(mission.mission_id).unwrap();
    assert_eq!(mission.steps.len(), 3);
    assert_eq!(mission.status, MissionStatus::Aborted);
    let reason = mission.aborted_reason.unwrap();
    assert!(reason.contains("rollback failed"));
    assert!(reason.contains(&outcome.contract_id.to_string()));
}

#[tokio::test]
async fn mission_confidence_smooths_across_steps() {
    // Three steps with decaying quality: 0.9, 0.85, 0.5. The rolling
    // confidence dips but stays above the abort threshold.
    let harness = build_default(Arc::new(ScriptedAdapter::returning(released_effect())));
    let mission = harness.missions.start_mission("drain stuck migration queue");

    for (measured, expected_step) in [(220.0, 0.9), (230.0, 0.85), (300.0, 0.5)] {
        let adapter = Arc::new(ScriptedAdapter::returning(indexmap! {
            "queue_depth".to_string() => Observed::from(measured),
        }));
        let step_executor = ActionExecutor::new(
            harness.contracts.clone(),
            Arc::new(SafeHoldManager::new(Arc::new(
                MemoryStorageBackend::with_resource(RESOURCE, b"known-good"),
            ))),
            Arc::new(BenchmarkEngine::new(
                Arc::new(StaticProbe::returning(healthy_metrics())),
                benchmark_config(),
            )),
            harness.missions.clone(),
            adapter,
            Arc::new(AllowAllGate),
            Arc::new(RecordingAuditSink::new()),
        );

        let request = ActionRequest::new("drain_queue", "pb-queue", AutonomyTier::Tier1, RESOURCE)
            .with_expected_effect(indexmap! {
                "queue_depth".to_string() => Expected::at_most(200.0),
            })
            .with_baseline_state(indexmap! {
                "error_rate".to_string() => Observed::from(0.01),
                "latency_p50_ms".to_string() => Observed::from(100.0),
            })
            .with_mission(mission.mission_id);
        let outcome = step_executor.execute_verified_action(request).await.unwrap();
        assert!((outcome.confidence - expected_step).abs() < 1e-9);
    }

    let mission = harness.missions.get(mission.mission_id).unwrap();
    assert_eq!(mission.steps.len(), 3);
    // 0.9 -> 0.7*0.9 + 0.3*0.85 = 0.885 -> 0.7*0.885 + 0.3*0.5 = 0.7695
    assert!((mission.current_confidence - 0.7695).abs() < 1e-9);
    assert_eq!(mission.status, MissionStatus::InProgress);
}

#[tokio::test]
async fn verified_tier2_step_marks_mission_safe_point() {
    let harness = build_default(Arc::new(ScriptedAdapter::returning(released_effect())));
    let mission = harness.missions.start_mission("unblock writes");

    let outcome = harness
        .executor
        .execute_verified_action(clear_lock_request().with_mission(mission.mission_id))
        .await
        .unwrap();
    assert_eq!(outcome.status, OutcomeStatus::Success);

    let mission = harness.missions.get(mission.mission_id).unwrap();
    assert_eq!(mission.safe_points, vec![outcome.snapshot_id.unwrap()]);
}

#[tokio::test]
async fn collapsing_mission_aborts() {
    let harness = build_default(Arc::new(ScriptedAdapter::returning(released_effect())));
    let mission = harness.missions.start_mission("risky migration");

    // Step confidences 0.6 then 0.1: rolling falls to 0.45 and the mission
    // aborts itself.
    for measured in [280.0, 380.0] {
        let adapter = Arc::new(ScriptedAdapter::returning(indexmap! {
            "queue_depth".to_string() => Observed::from(measured),
        }));
        let step_executor = ActionExecutor::new(
            harness.contracts.clone(),
            Arc::new(SafeHoldManager::new(Arc::new(
                MemoryStorageBackend::with_resource(RESOURCE, b"known-good"),
            ))),
            Arc::new(BenchmarkEngine::new(
                Arc::new(StaticProbe::returning(healthy_metrics())),
                benchmark_config(),
            )),
            harness.missions.clone(),
            adapter,
            Arc::new(AllowAllGate),
            Arc::new(RecordingAuditSink::new()),
        );
        let request = ActionRequest::new("migrate", "pb-migrate", AutonomyTier::Tier1, RESOURCE)
            .with_expected_effect(indexmap! {
                "queue_depth".to_string() => Expected::at_most(200.0),
            })
            .with_baseline_state(indexmap! {
                "error_rate".to_string() => Observed::from(0.01),
                "latency_p50_ms".to_string() => Observed::from(100.0),
            })
            .with_mission(mission.mission_id);
        step_executor.execute_verified_action(request).await.unwrap();
    }

    let mission = harness.missions.get(mission.mission_id).unwrap();
    assert_eq!(mission.status, MissionStatus::Aborted);
    assert!(mission.aborted_reason.unwrap().contains("abort threshold"));
}

/// Adapter that tracks how many invocations overlap
struct ConcurrencyTrackingAdapter {
    concurrent: std::sync::atomic::AtomicU32,
    peak: std::sync::atomic::AtomicU32,
}

impl ConcurrencyTrackingAdapter {
    fn new() -> Self {
        Self {
            concurrent: std::sync::atomic::AtomicU32::new(0),
            peak: std::sync::atomic::AtomicU32::new(0),
        }
    }

    fn peak(&self) -> u32 {
        self.peak.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ActionAdapter for ConcurrencyTrackingAdapter {
    async fn perform(
        &self,
        _action_type: &str,
        _parameters: &serde_json::Value,
    ) -> Result<EffectMap, AdapterError> {
        use std::sync::atomic::Ordering;
        let now = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.concurrent.fetch_sub(1, Ordering::SeqCst);
        Ok(indexmap! { "lock_state".to_string() => Observed::from("released") })
    }
}

#[tokio::test]
async fn worker_pool_caps_in_flight_actions() {
    let adapter = Arc::new(ConcurrencyTrackingAdapter::new());
    let backend = Arc::new(MemoryStorageBackend::new());
    for i in 0..4 {
        backend.set_resource(&format!("cache-{i}"), b"known-good");
    }
    let executor = Arc::new(
        ActionExecutor::new(
            Arc::new(ContractStore::new()),
            Arc::new(SafeHoldManager::new(backend)),
            Arc::new(BenchmarkEngine::new(
                Arc::new(StaticProbe::returning(healthy_metrics())),
                benchmark_config(),
            )),
            Arc::new(ProgressionTracker::new()),
            adapter.clone(),
            Arc::new(AllowAllGate),
            Arc::new(RecordingAuditSink::new()),
        )
        .with_config(ExecutorConfig::default().with_max_concurrent_actions(1)),
    );

    // Four actions on disjoint resources; the pool still admits one at a time
    let mut handles = Vec::new();
    for i in 0..4 {
        let executor = executor.clone();
        handles.push(tokio::spawn(async move {
            let request = ActionRequest::new(
                "flush_cache",
                "pb-cache",
                AutonomyTier::Tier2,
                format!("cache-{i}"),
            )
            .with_expected_effect(indexmap! {
                "lock_state".to_string() => Expected::exact("released"),
            })
            .with_baseline_state(indexmap! {
                "error_rate".to_string() => Observed::from(0.01),
                "latency_p50_ms".to_string() => Observed::from(100.0),
            });
            executor.execute_verified_action(request).await.unwrap()
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().status, OutcomeStatus::Success);
    }
    assert_eq!(adapter.peak(), 1);
}

#[tokio::test]
async fn signed_audit_chain_survives_mixed_outcomes() {
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    let audit = Arc::new(SignedAuditLog::new(SigningKey::generate(&mut OsRng)));
    let backend = Arc::new(MemoryStorageBackend::with_resource(RESOURCE, b"known-good"));
    let contracts = Arc::new(ContractStore::new());
    let missions = Arc::new(ProgressionTracker::new());

    // One success, one rollback
    for effect in [
        indexmap! { "lock_state".to_string() => Observed::from("released") },
        indexmap! { "lock_state".to_string() => Observed::from("stuck") },
    ] {
        let executor = ActionExecutor::new(
            contracts.clone(),
            Arc::new(SafeHoldManager::new(backend.clone())),
            Arc::new(BenchmarkEngine::new(
                Arc::new(StaticProbe::returning(healthy_metrics())),
                benchmark_config(),
            )),
            missions.clone(),
            Arc::new(ScriptedAdapter::returning(effect)),
            Arc::new(AllowAllGate),
            audit.clone() as Arc<dyn AuditSink>,
        );
        executor
            .execute_verified_action(clear_lock_request())
            .await
            .unwrap();
    }

    let events = audit.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].record.status, ContractStatus::Verified);
    assert_eq!(events[1].record.status, ContractStatus::RolledBack);
    assert!(audit.verify_integrity(&audit.verifying_key()).is_ok());
}
