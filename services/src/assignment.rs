use chrono::{DateTime, Utc};
use marker::types::TestCase;
use serde::{Deserialize, Serialize};
use util::execution_config::{LatePolicy, MarkingOptions};

/// Assignment definition as supplied by the assignment store.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Assignment {
    pub id: String,
    pub name: String,
    pub test_cases: Vec<TestCase>,
    /// Submissions before this instant are rejected.
    #[serde(default)]
    pub available_from: Option<DateTime<Utc>>,
    /// Soft deadline; late penalties apply after it.
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    /// Nothing is accepted after this instant.
    #[serde(default)]
    pub hard_deadline: Option<DateTime<Utc>>,
    /// `None` means unlimited.
    #[serde(default)]
    pub allowed_attempts: Option<u32>,
    #[serde(default)]
    pub late: LatePolicy,
    /// Minimum final score (in points) for a submission to pass.
    pub passing_score: u32,
    #[serde(default)]
    pub marking: MarkingOptions,
}

impl Assignment {
    /// Total points available across all test cases.
    pub fn points(&self) -> u32 {
        self.test_cases
            .iter()
            .fold(0u32, |acc, t| acc.saturating_add(t.points))
    }
}
