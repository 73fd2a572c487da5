//! # Scorer Module
//!
//! Aggregates per-test outcomes into a score.

use crate::types::TestOutcome;

/// Round a float to two decimal places.
#[inline]
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Sums awarded and possible points.
///
/// # Example
///
/// ```
/// use marker::scorer::compute_score;
///
/// let (raw, max) = compute_score(&[]);
/// assert_eq!((raw, max), (0, 0));
/// ```
pub fn compute_score(outcomes: &[TestOutcome]) -> (u32, u32) {
    outcomes.iter().fold((0u32, 0u32), |(raw, max), o| {
        (
            raw.saturating_add(o.awarded_points),
            max.saturating_add(o.possible_points),
        )
    })
}

/// `raw / max` as a percentage with two decimals. Zero when nothing was possible.
pub fn percentage(raw: u32, max: u32) -> f64 {
    percentage_of(raw as f64, max)
}

/// Same as [`percentage`] for a fractional score, e.g. after a late penalty.
pub fn percentage_of(score: f64, max: u32) -> f64 {
    if max == 0 {
        return 0.0;
    }
    round2(score / max as f64 * 100.0)
}

/// Without partial credit a submission earns its points only if every test passed.
pub fn apply_all_or_nothing(outcomes: &mut [TestOutcome]) {
    if outcomes.iter().all(|o| o.passed) {
        return;
    }
    for outcome in outcomes.iter_mut() {
        outcome.awarded_points = 0;
    }
}
