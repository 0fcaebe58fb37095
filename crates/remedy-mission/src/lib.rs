//! Mission progression tracking
//!
//! A mission groups an ordered sequence of action contracts pursuing one
//! higher-level remediation goal. The [`ProgressionTracker`] maintains a
//! rolling confidence over the steps (exponential smoothing, so one bad step
//! is felt immediately without tanking an otherwise healthy mission) and the
//! list of safe points (known-good snapshots) a new mission can resume from.
//!
//! The tracker references contract and snapshot ids only; it never writes
//! their internals.

mod tracker;
mod types;

pub use tracker::ProgressionTracker;
pub use types::{Mission, MissionError, MissionId, MissionStatus, MissionStep};
