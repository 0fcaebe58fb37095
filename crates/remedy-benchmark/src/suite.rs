//! Benchmark suite configuration

use remedy_contract::AutonomyTier;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Benchmark suite type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuiteType {
    /// Cheap health check, runs for every tier
    Smoke,
    /// Expensive full pass, tier >= 2 only
    FullRegression,
}

impl SuiteType {
    /// The suite an action of the given tier must run
    #[inline]
    #[must_use]
    pub fn for_tier(tier: AutonomyTier) -> Self {
        if tier.requires_full_regression() {
            SuiteType::FullRegression
        } else {
            SuiteType::Smoke
        }
    }
}

impl std::fmt::Display for SuiteType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuiteType::Smoke => f.write_str("smoke"),
            SuiteType::FullRegression => f.write_str("full_regression"),
        }
    }
}

/// Configuration for one benchmark suite
#[derive(Debug, Clone)]
pub struct SuiteConfig {
    /// Metric names the suite probes
    pub metrics: Vec<String>,
    /// Metrics whose absence fails the suite regardless of drift
    pub required: Vec<String>,
    /// Drift percentage above which the suite fails (default 20%)
    pub drift_threshold_pct: f64,
    /// Per-probe-call deadline
    pub probe_timeout: Duration,
}

impl SuiteConfig {
    /// Create a suite over the given metric names, all required
    #[must_use]
    pub fn new(metrics: Vec<String>) -> Self {
        Self {
            required: metrics.clone(),
            metrics,
            drift_threshold_pct: 20.0,
            probe_timeout: Duration::from_secs(10),
        }
    }

    /// With a drift threshold override
    #[inline]
    #[must_use]
    pub fn with_drift_threshold(mut self, pct: f64) -> Self {
        self.drift_threshold_pct = pct;
        self
    }

    /// With a probe timeout override
    #[inline]
    #[must_use]
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// With an explicit required subset
    #[inline]
    #[must_use]
    pub fn with_required(mut self, required: Vec<String>) -> Self {
        self.required = required;
        self
    }
}

///// Engine-level configuration: one config per suite type
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    /// Smoke suite
    pub smoke: SuiteConfig,
    /// Full regression suite
    pub full_regression: SuiteConfig,
}

impl BenchmarkConfig {
    /// The config for a suite type
    #[inline]
    #[must_use]
    pub fn suite(&self, suite_type: SuiteType) -> &SuiteConfig {
        match suite_type {
            SuiteType::Smoke => &self.smoke,
            SuiteType::FullRegression => &self.full_regression,
        }
    }
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        let smoke = SuiteConfig::new(vec![
            "error_rate".to_string(),
            "latency_p50_ms".to_string(),
        ])
        .with_probe_timeout(Duration::from_secs(5));

        let full_regression = SuiteConfig::new(vec![
            "error_rate".to_string(),
            "latency_p50_ms".to_string(),
            "latency_p99_ms".to_string(),
            "throughput_rps".to_string(),
            "saturation_pct".to_string(),
        ])
        .with_probe_timeout(Duration::from_secs(30));

        Self {
            smoke,
            full_regression,
        }
    }
}
