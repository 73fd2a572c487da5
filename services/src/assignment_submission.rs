use chrono::{DateTime, Utc};
use marker::types::{GradingResult, TestOutcome};
use serde::Serialize;
use uuid::Uuid;

/// Verdict of a graded attempt. Records are only written once grading has
/// finished, so an attempt in flight has no stored status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Passed,
    Failed,
}

impl SubmissionStatus {
    pub fn from_verdict(passed: bool) -> Self {
        if passed {
            SubmissionStatus::Passed
        } else {
            SubmissionStatus::Failed
        }
    }
}

/// One graded attempt. Append-only: records are never modified after they are saved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionRecord {
    pub id: Uuid,
    pub submitter_id: String,
    pub assignment_id: String,
    /// 1-based attempt number for this submitter on this assignment.
    pub attempt: u32,
    pub language: String,
    pub code_content: String,
    pub submitted_at: DateTime<Utc>,
    pub status: SubmissionStatus,
    pub grading_result: GradingResult,
    pub late_penalty_percent: u32,
    /// Raw score after the late penalty, two decimals. Never above the raw score.
    pub final_score: f64,
}

/// Highest final score a submitter has reached on an assignment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestScore {
    pub submitter_id: String,
    pub assignment_id: String,
    pub final_score: f64,
    pub submission_id: Uuid,
}

/// What a submitter sees after submitting. Hidden outcomes are already redacted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionResult {
    pub submission_id: Uuid,
    pub attempt: u32,
    pub status: SubmissionStatus,
    pub raw_score: u32,
    pub score: f64,
    pub max_score: u32,
    pub percentage: f64,
    pub passed: bool,
    pub late_penalty_percent: u32,
    pub outcomes: Vec<TestOutcome>,
    /// Best final score after this attempt was recorded.
    pub best_score: f64,
}

impl SubmissionResult {
    pub fn from_record(record: &SubmissionRecord, best_score: f64) -> Self {
        let max_score = record.grading_result.max_score;
        Self {
            submission_id: record.id,
            attempt: record.attempt,
            status: record.status,
            raw_score: record.grading_result.raw_score,
            score: record.final_score,
            max_score,
            percentage: marker::scorer::percentage_of(record.final_score, max_score),
            passed: record.status == SubmissionStatus::Passed,
            late_penalty_percent: record.late_penalty_percent,
            outcomes: record.grading_result.outcomes.clone(),
            best_score,
        }
    }
}
