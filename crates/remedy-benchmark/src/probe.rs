//! Metric probe interface
//!
//! The engine does not know what a probe measures, only that it returns
//! name/value pairs and is allowed to time out. Probes may omit keys on
//! partial failure; the engine treats omissions as missing evidence.

use indexmap::IndexMap;

/// Errors surfaced by a metric probe
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// The probe exceeded its caller-supplied deadline
    #[error("probe timed out")]
    Timeout,

    /// The probe failed outright
    #[error("probe failure: {0}")]
    Failure(String),
}

/// Pluggable health-metric collector
#[async_trait::async_trait]
pub trait MetricProbe: Send + Sync {
    /// Measure the named metrics
    ///
    /// Implementations may return a subset of the requested names when some
    /// measurements fail; they must never substitute fabricated values.
    async fn measure(&self, metric_names: &[String]) -> Result<IndexMap<String, f64>, ProbeError>;
}
