//! Testing utilities for the Remedy workspace
//!
//! Shared fakes: an in-memory storage backend, a scripted adapter, a static
//! metric probe, governance gates and recording sinks.

#![allow(missing_docs)]

use indexmap::IndexMap;
use parking_lot::Mutex;
use remedy_benchmark::{MetricProbe, ProbeError};
use remedy_contract::{AutonomyTier, ContractId, EffectMap};
use remedy_executor::{
    ActionAdapter, AdapterError, AuditRecord, AuditSink, Authorization, GovernanceGate,
    LearningCollector, OutcomeEvent,
};
use remedy_safehold::{BackendError, Captured, ManifestHash, StorageBackend};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Install a test-writer tracing subscriber once per process
///
/// Honors `RUST_LOG`; safe to call from every test.
pub fn init_test_tracing() {
    use once_cell::sync::OnceCell;
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// In-memory storage backend: resources are byte blobs, captures are copies
#[derive(Default)]
pub struct MemoryStorageBackend {
    resources: Mutex<HashMap<String, Vec<u8>>>,
    captures: Mutex<HashMap<String, (String, Vec<u8>)>>,
    next_ref: Mutex<u64>,
    unavailable: Mutex<bool>,
    restores: Mutex<usize>,
}

impl MemoryStorageBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(resource_id: &str, state: &[u8]) -> Self {
        let backend = Self::default();
        backend.set_resource(resource_id, state);
        backend
    }

    pub fn set_resource(&self, resource_id: &str, state: &[u8]) {
        self.resources
            .lock()
            .insert(resource_id.to_string(), state.to_vec());
    }

    pub fn resource(&self, resource_id: &str) -> Option<Vec<u8>> {
        self.resources.lock().get(resource_id).cloned()
    }

    /// Flip a byte in a stored capture so integrity checks fail
    pub fn corrupt_capture(&self, storage_ref: &str) {
        if let Some((_, data)) = self.captures.lock().get_mut(storage_ref) {
            data.push(0xFF);
        }
    }

    pub fn set_unavailable(&self, value: bool) {
        *self.unavailable.lock() = value;
    }

    pub fn restore_count(&self) -> usize {
        *self.restores.lock()
    }
}

#[async_trait::async_trait]
impl StorageBackend for MemoryStorageBackend {
    async fn capture(&self, resource_id: &str) -> Result<Captured, BackendError> {
        if *self.unavailable.lock() {
            return Err(BackendError::Unavailable("backend offline".to_string()));
        }
        let state = self
            .resources
            .lock()
            .get(resource_id)
            .cloned()
            .ok_or_else(|| BackendError::OperationFailed(resource_id.to_string()))?;
        let mut next = self.next_ref.lock();
        *next += 1;
        let storage_ref = format!("mem://{resource_id}/{next}");
        self.captures
            .lock()
            .insert(storage_ref.clone(), (resource_id.to_string(), state.clone()));
        Ok(Captured {
            storage_ref,
            manifest: state,
        })
    }

    async fn restore(&self, storage_ref: &str) -> Result<(), BackendError> {
        if *self.unavailable.lock() {
            return Err(BackendError::Unavailable("backend offline".to_string()));
        }
        let (resource_id, state) = self
            .captures
            .lock()
            .get(storage_ref)
            .cloned()
            .ok_or_else(|| BackendError::UnknownRef(storage_ref.to_string()))?;
        self.resources.lock().insert(resource_id, state);
        *self.restores.lock() += 1;
        Ok(())
    }

    async fn verify(
        &self,
        storage_ref: &str,
        manifest_hash: &ManifestHash,
    ) -> Result<bool, BackendError> {
        let (_, state) = self
            .captures
            .lock()
            .get(storage_ref)
            .cloned()
            .ok_or_else(|| BackendError::UnknownRef(storage_ref.to_string()))?;
        Ok(&ManifestHash::compute(&state) == manifest_hash)
    }
}

enum AdapterMode {
    Succeed(EffectMap),
    Transient(String),
    Permanent(String),
}

/// Adapter with a scripted response, optionally flaky at first
pub struct ScriptedAdapter {
    transient_failures: Mutex<u32>,
    mode: AdapterMode,
    calls: AtomicU32,
}

impl ScriptedAdapter {
    /// Always succeed with the given effect
    pub fn returning(effect: EffectMap) -> Self {
        Self {
            transient_failures: Mutex::new(0),
            mode: AdapterMode::Succeed(effect),
            calls: AtomicU32::new(0),
        }
    }

    /// Fail transiently `failures` times, then succeed with the effect
    pub fn transient_then_success(failures: u32, effect: EffectMap) -> Self {
        Self {
            transient_failures: Mutex::new(failures),
            mode: AdapterMode::Succeed(effect),
            calls: AtomicU32::new(0),
        }
    }

    /// Always fail transiently
    pub fn failing_transient(message: &str) -> Self {
        Self {
            transient_failures: Mutex::new(0),
            mode: AdapterMode::Transient(message.to_string()),
            calls: AtomicU32::new(0),
        }
    }

    /// Always fail permanently
    pub fn failing_permanent(message: &str) -> Self {
        Self {
            transient_failures: Mutex::new(0),
            mode: AdapterMode::Permanent(message.to_string()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ActionAdapter for ScriptedAdapter {
    async fn perform(
        &self,
        _action_type: &str,
        _parameters: &serde_json::Value,
    ) -> Result<EffectMap, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        {
            let mut remaining = self.transient_failures.lock();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(AdapterError::Transient("connection reset".to_string()));
            }
        }
        match &self.mode {
            AdapterMode::Succeed(effect) => Ok(effect.clone()),
            AdapterMode::Transient(msg) => Err(AdapterError::Transient(msg.clone())),
            AdapterMode::Permanent(msg) => Err(AdapterError::Permanent(msg.clone())),
        }
    }
}

/// Probe returning a fixed metric set, optionally slow or failing
pub struct StaticProbe {
    values: Mutex<IndexMap<String, f64>>,
    delay: Option<Duration>,
    fail: bool,
}

impl StaticProbe {
    pub fn returning(values: IndexMap<String, f64>) -> Self {
        Self {
            values: Mutex::new(values),
            delay: None,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            values: Mutex::new(IndexMap::new()),
            delay: None,
            fail: true,
        }
    }

    pub fn delayed(values: IndexMap<String, f64>, delay: Duration) -> Self {
        Self {
            values: Mutex::new(values),
            delay: Some(delay),
            fail: false,
        }
    }

    /// Change the reported metrics mid-test
    pub fn set_values(&self, values: IndexMap<String, f64>) {
        *self.values.lock() = values;
    }
}

#[async_trait::async_trait]
impl MetricProbe for StaticProbe {
    async fn measure(&self, metric_names: &[String]) -> Result<IndexMap<String, f64>, ProbeError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(ProbeError::Failure("collector crashed".to_string()));
        }
        let values = self.values.lock();
        Ok(metric_names
            .iter()
            .filter_map(|n| values.get(n).map(|v| (n.clone(), *v)))
            .collect())
    }
}

/// Gate that allows everything
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllGate;

#[async_trait::async_trait]
impl GovernanceGate for AllowAllGate {
    async fn authorize(
        &self,
        _action_type: &str,
        _tier: AutonomyTier,
        _blast_radius: &str,
    ) -> Authorization {
        Authorization::Allow
    }

    async fn await_approval(&self, _contract_id: ContractId) -> bool {
        true
    }
}

/// Gate that denies everything with a fixed reason
#[derive(Debug, Clone)]
pub struct DenyAllGate {
    pub reason: String,
}

impl DenyAllGate {
    pub fn new(reason: &str) -> Self {
        Self {
            reason: reason.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl GovernanceGate for DenyAllGate {
    async fn authorize(
        &self,
        _action_type: &str,
        _tier: AutonomyTier,
        _blast_radius: &str,
    ) -> Authorization {
        Authorization::Deny {
            reason: self.reason.clone(),
        }
    }

    async fn await_approval(&self, _contract_id: ContractId) -> bool {
        false
    }
}

/// Gate that demands approval, then answers after an optional delay
pub struct ApprovalGate {
    approve: bool,
    delay: Option<Duration>,
}

impl ApprovalGate {
    pub fn approving() -> Self {
        Self {
            approve: true,
            delay: None,
        }
    }

    pub fn refusing() -> Self {
        Self {
            approve: false,
            delay: None,
        }
    }

    /// Approval that arrives only after `delay`
    pub fn approving_after(delay: Duration) -> Self {
        Self {
            approve: true,
            delay: Some(delay),
        }
    }
}

#[async_trait::async_trait]
impl GovernanceGate for ApprovalGate {
    async fn authorize(
        &self,
        _action_type: &str,
        _tier: AutonomyTier,
        _blast_radius: &str,
    ) -> Authorization {
        Authorization::RequireApproval
    }

    async fn await_approval(&self, _contract_id: ContractId) -> bool {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.approve
    }
}

/// Audit sink that keeps every record in memory
#[derive(Default)]
pub struct RecordingAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl RecordingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }
}

impl AuditSink for RecordingAuditSink {
    fn append(&self, record: AuditRecord) {
        self.records.lock().push(record);
    }
}

/// Learning collector that keeps every event in memory
#[derive(Default)]
pub struct RecordingCollector {
    events: Mutex<Vec<OutcomeEvent>>,
}

impl RecordingCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<OutcomeEvent> {
        self.events.lock().clone()
    }
}

impl LearningCollector for RecordingCollector {
    fn record(&self, event: OutcomeEvent) {
        self.events.lock().push(event);
    }
}
