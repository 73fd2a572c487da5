//! # Types Module
//!
//! Inputs and outputs of a grading run.

use code_manager::ExecutionStatus;
use serde::{Deserialize, Serialize};

/// One (input, expected output, points) tuple. Owned by the assignment definition.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TestCase {
    pub id: String,
    #[serde(default)]
    pub input: String,
    pub expected_output: String,
    pub points: u32,
    #[serde(default)]
    pub hidden: bool,
    /// Overrides the marking default and the language default.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub memory_limit_mb: Option<u64>,
}

/// Why a test did not run cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeError {
    pub kind: ExecutionStatus,
    /// Diagnostic excerpt (compiler output, stderr). Withheld for hidden tests.
    pub detail: Option<String>,
}

/// Result of one test case.
///
/// For hidden tests `input`, `expected_output`, `actual_output` and the error
/// detail are always `None`; only pass/fail, points and the error kind remain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestOutcome {
    pub test_case_id: String,
    pub passed: bool,
    pub awarded_points: u32,
    pub possible_points: u32,
    pub hidden: bool,
    pub input: Option<String>,
    pub expected_output: Option<String>,
    pub actual_output: Option<String>,
    pub execution_time_ms: u64,
    pub memory_peak_kb: Option<u64>,
    pub error: Option<OutcomeError>,
}

/// Aggregate of one grading run. `outcomes` follow the order of the test cases.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradingResult {
    pub raw_score: u32,
    pub max_score: u32,
    /// `raw_score / max_score * 100`, two decimals; 0 when `max_score` is 0.
    pub percentage: f64,
    pub passed: bool,
    pub outcomes: Vec<TestOutcome>,
    /// Sum of the per-test execution times.
    pub total_execution_time_ms: u64,
}
