//! Late-penalty arithmetic.

use chrono::{DateTime, Utc};

const MS_PER_DAY: i64 = 86_400_000;

/// Started days past `deadline`: one millisecond late is one day late.
/// Zero when `now` is at or before the deadline.
pub fn days_late(now: DateTime<Utc>, deadline: DateTime<Utc>) -> u32 {
    let late_ms = (now - deadline).num_milliseconds();
    if late_ms <= 0 {
        return 0;
    }
    let days = (late_ms + MS_PER_DAY - 1) / MS_PER_DAY;
    u32::try_from(days).unwrap_or(u32::MAX)
}

/// `min(100, days_late * per_day)`.
pub fn penalty_percent(days_late: u32, per_day: u32) -> u32 {
    days_late.saturating_mul(per_day).min(100)
}

/// `raw * (1 - percent / 100)`, two decimals.
pub fn apply_penalty(raw_score: u32, percent: u32) -> f64 {
    let factor = 1.0 - f64::from(percent.min(100)) / 100.0;
    marker::scorer::round2(f64::from(raw_score) * factor)
}
