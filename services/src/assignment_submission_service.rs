use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use code_manager::SandboxError;
use marker::error::MarkerError;
use marker::traits::executor::Executor;
use marker::GradingJob;
use util::languages::LanguageRegistry;
use uuid::Uuid;

use crate::assignment::Assignment;
use crate::assignment_submission::{BestScore, SubmissionRecord, SubmissionResult, SubmissionStatus};
use crate::clock::{Clock, SystemClock};
use crate::error::{PolicyError, SubmissionError};
use crate::late_penalty;
use crate::repository::{AssignmentStore, EnrollmentLookup, SubmissionStore};

/// Lifecycle of one submission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Received,
    Validated,
    Executing,
    Scored,
    Persisted,
    Rejected,
}

impl fmt::Display for AttemptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttemptState::Received => "received",
            AttemptState::Validated => "validated",
            AttemptState::Executing => "executing",
            AttemptState::Scored => "scored",
            AttemptState::Persisted => "persisted",
            AttemptState::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// Tracks and logs the state of one attempt.
struct Attempt<'a> {
    submitter_id: &'a str,
    assignment_id: &'a str,
    state: AttemptState,
}

impl<'a> Attempt<'a> {
    fn new(submitter_id: &'a str, assignment_id: &'a str) -> Self {
        tracing::info!(submitter = submitter_id, assignment = assignment_id, state = %AttemptState::Received, "submission attempt");
        Self {
            submitter_id,
            assignment_id,
            state: AttemptState::Received,
        }
    }

    fn advance(&mut self, next: AttemptState) {
        tracing::info!(
            submitter = self.submitter_id,
            assignment = self.assignment_id,
            from = %self.state,
            to = %next,
            "submission attempt"
        );
        self.state = next;
    }

    fn reject(&mut self, reason: PolicyError) -> SubmissionError {
        tracing::info!(
            submitter = self.submitter_id,
            assignment = self.assignment_id,
            from = %self.state,
            to = %AttemptState::Rejected,
            %reason,
            "submission attempt"
        );
        self.state = AttemptState::Rejected;
        SubmissionError::Policy(reason)
    }
}

/// Applies academic policy around the grading engine.
///
/// Attempts by the same submitter on the same assignment are serialised, so two
/// concurrent requests cannot both take the last allowed attempt.
pub struct SubmissionService {
    registry: Arc<LanguageRegistry>,
    executor: Arc<dyn Executor>,
    enrollment: Arc<dyn EnrollmentLookup>,
    assignments: Arc<dyn AssignmentStore>,
    submissions: Arc<dyn SubmissionStore>,
    clock: Arc<dyn Clock>,
    attempt_locks: AttemptLocks,
}

impl SubmissionService {
    pub fn new(
        registry: Arc<LanguageRegistry>,
        executor: Arc<dyn Executor>,
        enrollment: Arc<dyn EnrollmentLookup>,
        assignments: Arc<dyn AssignmentStore>,
        submissions: Arc<dyn SubmissionStore>,
    ) -> Self {
        Self {
            registry,
            executor,
            enrollment,
            assignments,
            submissions,
            clock: Arc::new(SystemClock),
            attempt_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Identifiers accepted as `language` by [`SubmissionService::submit`].
    pub fn supported_languages(&self) -> Vec<String> {
        self.registry.ids()
    }

    /// Every recorded attempt, oldest first.
    pub async fn history(
        &self,
        submitter_id: &str,
        assignment_id: &str,
    ) -> Result<Vec<SubmissionRecord>, SubmissionError> {
        Ok(self
            .submissions
            .list_submissions(submitter_id, assignment_id)
            .await?)
    }

    pub async fn best_score(
        &self,
        submitter_id: &str,
        assignment_id: &str,
    ) -> Result<Option<BestScore>, SubmissionError> {
        Ok(self
            .submissions
            .get_best_score(submitter_id, assignment_id)
            .await?)
    }

    /// Validates, grades and records one submission.
    ///
    /// Policy checks run in order and stop at the first failure: enrollment,
    /// availability, hard deadline, soft deadline, attempt limit, language and
    /// test cases. Nothing is persisted unless grading completes.
    pub async fn submit(
        &self,
        submitter_id: &str,
        assignment_id: &str,
        source_code: &str,
        language: &str,
    ) -> Result<SubmissionResult, SubmissionError> {
        let lease = self.attempt_lease(submitter_id, assignment_id);
        let _guard = lease.lock.lock().await;
        self.submit_locked(submitter_id, assignment_id, source_code, language)
            .await
    }

    async fn submit_locked(
        &self,
        submitter_id: &str,
        assignment_id: &str,
        source_code: &str,
        language: &str,
    ) -> Result<SubmissionResult, SubmissionError> {
        let mut attempt = Attempt::new(submitter_id, assignment_id);
        let now = self.clock.now();

        if !self.enrollment.is_enrolled(submitter_id, assignment_id).await? {
            return Err(attempt.reject(PolicyError::NotEnrolled));
        }
        let assignment = self
            .assignments
            .get_assignment(assignment_id)
            .await?
            .ok_or_else(|| SubmissionError::AssignmentNotFound(assignment_id.to_string()))?;

        let late_penalty_percent = match check_schedule(&assignment, now) {
            Ok(percent) => percent,
            Err(reason) => return Err(attempt.reject(reason)),
        };

        let prior_attempts = self
            .submissions
            .count_attempts(submitter_id, assignment_id)
            .await?;
        if let Some(allowed) = assignment.allowed_attempts {
            if prior_attempts >= allowed {
                return Err(attempt.reject(PolicyError::AttemptsExhausted { allowed }));
            }
        }

        let recipe = match self.registry.resolve(language) {
            Ok(recipe) => recipe,
            Err(_) => return Err(attempt.reject(PolicyError::UnsupportedLanguage(language.to_string()))),
        };
        if assignment.test_cases.is_empty() {
            return Err(attempt.reject(PolicyError::NoTestCases));
        }
        attempt.advance(AttemptState::Validated);

        attempt.advance(AttemptState::Executing);
        let mut grading = GradingJob::new(
            source_code,
            recipe.id.clone(),
            assignment.test_cases.clone(),
            assignment.marking.clone(),
        )
        .grade(&self.registry, self.executor.as_ref())
        .await
        .map_err(|e| match e {
            MarkerError::NoTestCases => attempt.reject(PolicyError::NoTestCases),
            MarkerError::UnsupportedLanguage(_) => {
                attempt.reject(PolicyError::UnsupportedLanguage(language.to_string()))
            }
            MarkerError::Infrastructure(SandboxError::QueueTimeout(wait)) => {
                tracing::warn!(submitter = submitter_id, assignment = assignment_id, ?wait, "no sandbox slot, attempt abandoned");
                SubmissionError::QueueTimeout
            }
            MarkerError::Infrastructure(err) => {
                tracing::error!(submitter = submitter_id, assignment = assignment_id, error = %err, "grading unavailable, attempt abandoned");
                SubmissionError::GradingUnavailable
            }
        })?;

        let final_score = late_penalty::apply_penalty(grading.raw_score, late_penalty_percent);
        let passed = final_score >= f64::from(assignment.passing_score);
        // The stored verdict is the penalised one.
        grading.passed = passed;
        attempt.advance(AttemptState::Scored);

        let record = SubmissionRecord {
            id: Uuid::new_v4(),
            submitter_id: submitter_id.to_string(),
            assignment_id: assignment_id.to_string(),
            attempt: prior_attempts + 1,
            language: recipe.id.clone(),
            code_content: source_code.to_string(),
            submitted_at: now,
            status: SubmissionStatus::from_verdict(passed),
            grading_result: grading,
            late_penalty_percent,
            final_score,
        };
        self.submissions.save_submission(record.clone()).await?;
        let best = self.record_best_score(&record).await?;
        attempt.advance(AttemptState::Persisted);

        tracing::info!(
            submitter = submitter_id,
            assignment = assignment_id,
            attempt = record.attempt,
            final_score,
            late_penalty_percent,
            passed,
            best,
            "submission recorded"
        );
        Ok(SubmissionResult::from_record(&record, best))
    }

    /// Raises the stored best score if `record` beats it. Returns the best after the update.
    async fn record_best_score(&self, record: &SubmissionRecord) -> Result<f64, SubmissionError> {
        let current = self
            .submissions
            .get_best_score(&record.submitter_id, &record.assignment_id)
            .await?;
        match current {
            Some(best) if best.final_score >= record.final_score => Ok(best.final_score),
            _ => {
                self.submissions
                    .upsert_best_score(BestScore {
                        submitter_id: record.submitter_id.clone(),
                        assignment_id: record.assignment_id.clone(),
                        final_score: record.final_score,
                        submission_id: record.id,
                    })
                    .await?;
                Ok(record.final_score)
            }
        }
    }

    fn attempt_lease(&self, submitter_id: &str, assignment_id: &str) -> AttemptLease<'_> {
        let key = (submitter_id.to_string(), assignment_id.to_string());
        let mut locks = self.attempt_locks.lock().unwrap_or_else(|e| e.into_inner());
        let lock = Arc::clone(locks.entry(key.clone()).or_default());
        AttemptLease {
            locks: &self.attempt_locks,
            key,
            lock,
        }
    }

    #[cfg(test)]
    fn attempt_lock_count(&self) -> usize {
        self.attempt_locks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

type AttemptLocks = Mutex<HashMap<(String, String), Arc<tokio::sync::Mutex<()>>>>;

/// A handle on one (submitter, assignment) lock. Dropping the last handle removes
/// the map entry, including when the owning `submit` future is cancelled.
struct AttemptLease<'a> {
    locks: &'a AttemptLocks,
    key: (String, String),
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for AttemptLease<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // One reference held by the map, one by this lease.
        if locks
            .get(&self.key)
            .is_some_and(|l| Arc::ptr_eq(l, &self.lock) && Arc::strong_count(l) == 2)
        {
            locks.remove(&self.key);
        }
    }
}

/// Availability and deadline checks. Returns the late penalty percentage.
fn check_schedule(assignment: &Assignment, now: DateTime<Utc>) -> Result<u32, PolicyError> {
    if assignment.available_from.is_some_and(|from| now < from) {
        return Err(PolicyError::NotYetAvailable);
    }
    if assignment.hard_deadline.is_some_and(|hard| now > hard) {
        return Err(PolicyError::DeadlineExpired);
    }
    match assignment.deadline {
        Some(deadline) if now > deadline => {
            if !assignment.late.allow_late_submissions {
                return Err(PolicyError::LateNotAllowed);
            }
            let days = late_penalty::days_late(now, deadline);
            Ok(late_penalty::penalty_percent(days, assignment.late.late_penalty_per_day))
        }
        _ => Ok(0),
    }
}
