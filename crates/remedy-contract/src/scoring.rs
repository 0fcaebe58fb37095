//! Verification scoring
//!
//! Compares a contract's declared [`ExpectationMap`] against the measured
//! [`EffectMap`] and derives a confidence score in [0, 1].
//!
//! Scoring rules, per key:
//! - exact string / bool match -> 1.0
//! - number inside the declared range or tolerance -> 1.0
//! - number outside -> linear decay proportional to the distance from the
//!   violated bound, normalized by the bound's magnitude, floored at 0.0
//! - key missing from the actual effect -> 0.0, flagged separately as an
//!   instrumentation gap (the probe layer failed to report, which is a
//!   different defect than the action failing)
//! - type mismatch -> 0.0
//!
//! The overall confidence is the weighted mean of per-key scores; weights
//! default to 1.0 unless a key declares an override.

use crate::types::{EffectMap, Expectation, ExpectationMap, Expected, Observed};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Score for a single expected key
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyScore {
    /// Match score in [0, 1]
    pub score: f64,
    /// Effective weight applied to this key
    pub weight: f64,
    /// True when the key was absent from the actual effect
    pub instrumentation_gap: bool,
}

/// Result of scoring a contract's expected vs. actual effect
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verification {
    /// Weighted mean of per-key scores, in [0, 1]
    pub confidence: f64,
    /// Per-key breakdown, in expectation order
    pub key_scores: IndexMap<String, KeyScore>,
    /// Keys the actual effect failed to report at all
    pub instrumentation_gaps: Vec<String>,
}

impl Verification {
    /// Check whether confidence meets a threshold
    #[inline]
    #[must_use]
    pub fn passed(&self, threshold: f64) -> bool {
        self.confidence >= threshold
    }

    /// True when at least one expected key went unreported
    #[inline]
    #[must_use]
    pub fn has_instrumentation_gaps(&self) -> bool {
        !self.instrumentation_gaps.is_empty()
    }
}

/// Score an actual effect against its declared expectations
///
/// Keys present in `actual` but not in `expected` are ignored: the contract
/// only scores what it declared. The caller guarantees `expected` is
/// non-empty (the store enforces this at contract creation).
#[must_use]
pub fn score_effects(expected: &ExpectationMap, actual: &EffectMap) -> Verification {
    let mut key_scores = IndexMap::with_capacity(expected.len());
    let mut gaps = Vec::new();
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;

    for (key, exp) in expected {
        let weight = exp.weight.unwrap_or(1.0);
        let (score, gap) = match actual.get(key) {
            Some(observed) => (score_key(exp, observed), false),
            None => (0.0, true),
        };
        if gap {
            gaps.push(key.clone());
        }
        weighted_sum += score * weight;
        weight_total += weight;
        key_scores.insert(
            key.clone(),
            KeyScore {
                score,
                weight,
                instrumentation_gap: gap,
            },
        );
    }

    let confidence = if weight_total > 0.0 {
        (weighted_sum / weight_total).clamp(0.0, 1.0)
    } else {
        0.0
    };

    Verification {
        confidence,
        key_scores,
        instrumentation_gaps: gaps,
    }
}

/// Score one observed value against one expectation
fn score_key(expected: &Expected, observed: &Observed) -> f64 {
    match (&expected.expectation, observed) {
        (Expectation::Exact(want), Observed::Text(got)) => {
            if want == got {
                1.0
            } else {
                0.0
            }
        }
        (Expectation::Bool(want), Observed::Bool(got)) => {
            if want == got {
                1.0
            } else {
                0.0
            }
        }
        (Expectation::Range { min, max }, Observed::Number(v)) => score_range(*min, *max, *v),
        (Expectation::Near { value, tolerance }, Observed::Number(v)) => {
            let deviation = (v - value).abs();
            if deviation <= *tolerance {
                1.0
            } else {
                decay(deviation - tolerance, *value)
            }
        }
        // Type mismatch: the measurement cannot satisfy the declared shape
        _ => 0.0,
    }
}

fn score_range(min: Option<f64>, max: Option<f64>, value: f64) -> f64 {
    if let Some(max) = max {
        if value > max {
            return decay(value - max, max);
        }
    }
    if let Some(min) = min {
        if value < min {
            return decay(min - value, min);
        }
    }
    1.0
}

/// Linear decay of a bound violation, normalized by the bound's magnitude
///
/// A violation equal to the bound itself scores 0.0. Bounds at or near zero
/// fall back to a unit scale so the decay stays defined.
fn decay(distance: f64, bound: f64) -> f64 {
    let scale = if bound.abs() > f64::EPSILON {
        bound.abs()
    } else {
        1.0
    };
    (1.0 - distance / scale).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Expected;
    use indexmap::indexmap;
    use proptest::prelude::*;

    #[test]
    fn exact_match_scores_one() {
        let expected = indexmap! {
            "status".to_string() => Expected::exact("resolved"),
        };
        let actual = indexmap! {
            "status".to_string() => Observed::from("resolved"),
            "error_rate".to_string() => Observed::from(0.0),
        };
        let v = score_effects(&expected, &actual);
        assert!((v.confidence - 1.0).abs() < f64::EPSILON);
        assert!(!v.has_instrumentation_gaps());
    }

    #[test]
    fn exact_mismatch_scores_zero() {
        let expected = indexmap! {
            "status".to_string() => Expected::exact("resolved"),
        };
        let actual = indexmap! {
            "status".to_string() => Observed::from("degraded"),
        };
        let v = score_effects(&expected, &actual);
        assert_eq!(v.confidence, 0.0);
    }

    #[test]
    fn range_violation_decays_linearly() {
        // 450 against max 200: distance 250, scale 200 -> decay below zero, floored
        let expected = indexmap! {
            "latency_ms".to_string() => Expected::at_most(200.0),
        };
        let actual = indexmap! {
            "latency_ms".to_string() => Observed::from(450.0),
        };
        let v = score_effects(&expected, &actual);
        assert_eq!(v.confidence, 0.0);

        // 250 against max 200: distance 50, scale 200 -> 0.75
        let actual = indexmap! {
            "latency_ms".to_string() => Observed::from(250.0),
        };
        let v = score_effects(&expected, &actual);
        assert!((v.confidence - 0.75).abs() < 1e-9);
    }

    #[test]
    fn range_inside_scores_one() {
        let expected = indexmap! {
            "connections".to_string() => Expected::range(5.0, 50.0),
        };
        let actual = indexmap! {
            "connections".to_string() => Observed::from(20.0),
        };
        let v = score_effects(&expected, &actual);
        assert!((v.confidence - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_key_is_flagged_as_instrumentation_gap() {
        let expected = indexmap! {
            "status".to_string() => Expected::exact("resolved"),
            "latency_ms".to_string() => Expected::at_most(200.0),
        };
        let actual = indexmap! {
            "status".to_string() => Observed::from("resolved"),
        };
        let v = score_effects(&expected, &actual);
        assert_eq!(v.instrumentation_gaps, vec!["latency_ms".to_string()]);
        assert!((v.confidence - 0.5).abs() < 1e-9);
        assert!(v.key_scores["latency_ms"].instrumentation_gap);
        assert!(!v.key_scores["status"].instrumentation_gap);
    }

    #[test]
    fn type_mismatch_scores_zero() {
        let expected = indexmap! {
            "latency_ms".to_string() => Expected::at_most(200.0),
        };
        let actual = indexmap! {
            "latency_ms".to_string() => Observed::from("fast"),
        };
        let v = score_effects(&expected, &actual);
        assert_eq!(v.confidence, 0.0);
        // Present but unusable: not an instrumentation gap
        assert!(!v.has_instrumentation_gaps());
    }

    #[test]
    fn weights_bias_the_mean() {
        let expected = indexmap! {
            "status".to_string() => Expected::exact("resolved").with_weight(3.0),
            "latency_ms".to_string() => Expected::at_most(200.0),
        };
        let actual = indexmap! {
            "status".to_string() => Observed::from("resolved"),
            "latency_ms".to_string() => Observed::from(450.0),
        };
        let v = score_effects(&expected, &actual);
        // (3.0 * 1.0 + 1.0 * 0.0) / 4.0
        assert!((v.confidence - 0.75).abs() < 1e-9);
    }

    #[test]
    fn near_within_tolerance() {
        let expected = indexmap! {
            "replicas".to_string() => Expected::near(3.0, 0.5),
        };
        let actual = indexmap! {
            "replicas".to_string() => Observed::from(3.0),
        };
        let v = score_effects(&expected, &actual);
        assert!((v.confidence - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bool_expectation() {
        let expected = indexmap! {
            "breaker_open".to_string() => Expected::boolean(false),
        };
        let actual = indexmap! {
            "breaker_open".to_string() => Observed::from(false),
        };
        let v = score_effects(&expected, &actual);
        assert!((v.confidence - 1.0).abs() < f64::EPSILON);
    }

    proptest! {
        #[test]
        fn confidence_always_in_unit_interval(
            value in -1e6f64..1e6,
            max in -1e3f64..1e3,
            weight in 0.0f64..10.0,
        ) {
            let expected = indexmap! {
                "m".to_string() => Expected::at_most(max).with_weight(weight),
            };
            let actual = indexmap! {
                "m".to_string() => Observed::from(value),
            };
            let v = score_effects(&expected, &actual);
            prop_assert!(v.confidence >= 0.0);
            prop_assert!(v.confidence <= 1.0);
        }
    }
}
