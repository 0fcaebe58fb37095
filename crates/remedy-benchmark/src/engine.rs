//! Benchmark engine
//!
//! One [`BenchmarkRun`] per evaluation, tied to a contract. Completed runs
//! are kept append-only for audit.

use crate::probe::{MetricProbe, ProbeError};
use crate::suite::{BenchmarkConfig, SuiteType};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use indexmap::IndexMap;
use remedy_contract::{ContractId, EffectMap};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use ulid::Ulid;

/// Unique benchmark run identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BenchmarkRunId(pub Ulid);

impl BenchmarkRunId {
    /// Generate new run ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for BenchmarkRunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BenchmarkRunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-metric comparison against baseline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricDelta {
    /// Baseline value the metric was compared against
    pub baseline: f64,
    /// Measured value
    pub measured: f64,
    /// Absolute relative deviation, in percent
    pub relative_pct: f64,
}

/// One evaluation of system health tied to a contract
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkRun {
    /// Run identifier
    pub run_id: BenchmarkRunId,
    /// Contract under evaluation
    pub contract_id: ContractId,
    /// Suite that was run
    pub suite_type: SuiteType,
    /// Measured metrics, in configuration order
    pub metrics: IndexMap<String, f64>,
    /// Per-metric baseline comparison (only metrics with a baseline)
    pub baseline_comparison: IndexMap<String, MetricDelta>,
    /// Requested metrics the probe failed to report
    pub missing_metrics: Vec<String>,
    /// True when drift exceeded the suite threshold
    pub drift_detected: bool,
    /// Maximum absolute relative deviation observed, in percent
    pub drift_percentage: f64,
    /// Overall verdict: no drift and no missing required metric
    pub passed: bool,
    /// When the run completed
    pub completed_at: DateTime<Utc>,
}

/// Engine running benchmark suites over a pluggable probe
pub struct BenchmarkEngine {
    probe: Arc<dyn MetricProbe>,
    config: BenchmarkConfig,
    /// Long-term statistical baseline, used when the action baseline lacks a
    /// metric
    long_term_baseline: IndexMap<String, f64>,
    runs: DashMap<BenchmarkRunId, BenchmarkRun>,
}

impl BenchmarkEngine {
    /// Create an engine over a probe with the given suite configuration
    #[must_use]
    pub fn new(probe: Arc<dyn MetricProbe>, config: BenchmarkConfig) -> Self {
        Self {
            probe,
            config,
            long_term_baseline: IndexMap::new(),
            runs: DashMap::new(),
        }
    }

    /// With an externally supplied long-term baseline
    #[must_use]
    pub fn with_long_term_baseline(mut self, baseline: IndexMap<String, f64>) -> Self {
        self.long_term_baseline = baseline;
        self
    }

    /// Run a suite for a contract
    ///
    /// The probe runs under the suite's timeout. A timeout or probe failure
    /// yields missing metrics rather than zeros, and any missing required
    /// metric fails the run regardless of the drift the remaining metrics
    /// show.
    pub async fn run(
        &self,
        contract_id: ContractId,
        suite_type: SuiteType,
        baseline_state: &EffectMap,
    ) -> BenchmarkRun {
        let suite = self.config.suite(suite_type);

        let measured = match tokio::time::timeout(
            suite.probe_timeout,
            self.probe.measure(&suite.metrics),
        )
        .await
        {
            Ok(Ok(values)) => values,
            Ok(Err(err)) => {
                tracing::warn!(%contract_id, suite = %suite_type, %err, "probe failed");
                IndexMap::new()
            }
            Err(_) => {
                let err = ProbeError::Timeout;
                tracing::warn!(
                    %contract_id,
                    suite = %suite_type,
                    timeout_ms = suite.probe_timeout.as_millis() as u64,
                    %err,
                    "probe deadline exceeded"
                );
                IndexMap::new()
            }
        };

        let mut metrics = IndexMap::with_capacity(suite.metrics.len());
        let mut comparison = IndexMap::new();
        let mut missing = Vec::new();
        let mut max_deviation_pct: f64 = 0.0;

        for name in &suite.metrics {
            let Some(value) = measured.get(name).copied() else {
                missing.push(name.clone());
                continue;
            };
            metrics.insert(name.clone(), value);

            let baseline = baseline_state
                .get(name)
                .and_then(|observed| observed.as_number())
                .or_else(|| self.long_term_baseline.get(name).copied());

            if let Some(baseline) = baseline {
                let relative_pct = relative_deviation_pct(baseline, value);
                max_deviation_pct = max_deviation_pct.max(relative_pct);
                comparison.insert(
                    name.clone(),
                    MetricDelta {
                        baseline,
                        measured: value,
                        relative_pct,
                    },
                );
            }
        }

        let drift_detected = max_deviation_pct > suite.drift_threshold_pct;
        let missing_required = suite.required.iter().any(|name| missing.contains(name));
        let passed = !drift_detected && !missing_required;

        let run = BenchmarkRun {
            run_id: BenchmarkRunId::new(),
            contract_id,
            suite_type,
            metrics,
            baseline_comparison: comparison,
            missing_metrics: missing,
            drift_detected,
            drift_percentage: max_deviation_pct,
            passed,
            completed_at: Utc::now(),
        };

        tracing::info!(
            run_id = %run.run_id,
            %contract_id,
            suite = %suite_type,
            drift_pct = run.drift_percentage,
            passed = run.passed,
            missing = run.missing_metrics.len(),
            "benchmark run completed"
        );

        self.runs.insert(run.run_id, run.clone());
        run
    }

    /// Get a completed run by id
    #[must_use]
    pub fn get(&self, run_id: BenchmarkRunId) -> Option<BenchmarkRun> {
        self.runs.get(&run_id).map(|r| r.clone())
    }

    /// All completed runs for a contract
    #[must_use]
    pub fn for_contract(&self, contract_id: ContractId) -> Vec<BenchmarkRun> {
        self.runs
            .iter()
            .filter(|r| r.contract_id == contract_id)
            .map(|r| r.clone())
            .collect()
    }
}

impl std::fmt::Debug for BenchmarkEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BenchmarkEngine")
            .field("runs", &self.runs.len())
            .finish_non_exhaustive()
    }
}

/// Absolute relative deviation as a percentage of the baseline
///
/// A zero baseline cannot anchor a ratio: any non-trivial deviation from it
/// is reported as 100%.
fn relative_deviation_pct(baseline: f64, measured: f64) -> f64 {
    if baseline.abs() < 1e-9 {
        if (measured - baseline).abs() < 1e-9 {
            0.0
        } else {
            100.0
        }
    } else {
        ((measured - baseline).abs() / baseline.abs()) * 100.0
    }
}
