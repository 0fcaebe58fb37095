//! Benchmark engine and drift detection
//!
//! Runs a named suite of health probes after an action, compares each metric
//! against the action's baseline (or a long-term statistical baseline) and
//! reports drift. Probe failures degrade to missing metrics, never to silent
//! zeros: a suite with any missing required metric fails conservatively,
//! because absence of evidence is not evidence of health.

mod engine;
mod probe;
mod suite;

pub use engine::{BenchmarkEngine, BenchmarkRun, BenchmarkRunId, MetricDelta};
pub use probe::{MetricProbe, ProbeError};
pub use suite::{BenchmarkConfig, SuiteConfig, SuiteType};
