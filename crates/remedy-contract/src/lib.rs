//! Action contracts and verification scoring
//!
//! An [`ActionContract`] pairs a remediation action's declared expected
//! effect with the effect actually measured after execution, and derives a
//! confidence score from the comparison. The [`ContractStore`] is the only
//! writer to contract records and enforces the status transition graph.

mod error;
mod scoring;
mod store;
mod types;

pub use error::ContractError;
pub use scoring::{score_effects, KeyScore, Verification};
pub use store::{ContractStore, CreateContract};
pub use types::{
    ActionContract, AutonomyTier, ContractId, ContractStatus, EffectMap, Expectation,
    ExpectationMap, Expected, Observed, StatusChange,
};
