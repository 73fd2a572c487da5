//! Collaborators the submission service depends on. The platform's database
//! implements these; [`crate::memory_repository::InMemoryStore`] implements them
//! for tests and local runs.

use async_trait::async_trait;

use crate::assignment::Assignment;
use crate::assignment_submission::{BestScore, SubmissionRecord};
use crate::error::StoreError;

#[async_trait]
pub trait EnrollmentLookup: Send + Sync {
    async fn is_enrolled(&self, submitter_id: &str, assignment_id: &str) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait AssignmentStore: Send + Sync {
    async fn get_assignment(&self, assignment_id: &str) -> Result<Option<Assignment>, StoreError>;
}

#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Appends a record. Records are never updated.
    async fn save_submission(&self, record: SubmissionRecord) -> Result<(), StoreError>;

    async fn count_attempts(&self, submitter_id: &str, assignment_id: &str) -> Result<u32, StoreError>;

    async fn get_best_score(
        &self,
        submitter_id: &str,
        assignment_id: &str,
    ) -> Result<Option<BestScore>, StoreError>;

    async fn upsert_best_score(&self, best: BestScore) -> Result<(), StoreError>;

    /// All records for the pair, oldest first.
    async fn list_submissions(
        &self,
        submitter_id: &str,
        assignment_id: &str,
    ) -> Result<Vec<SubmissionRecord>, StoreError>;
}
