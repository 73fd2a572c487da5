use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::assignment::Assignment;
use crate::assignment_submission::{BestScore, SubmissionRecord};
use crate::error::StoreError;
use crate::repository::{AssignmentStore, EnrollmentLookup, SubmissionStore};

type Key = (String, String);

fn key(submitter_id: &str, assignment_id: &str) -> Key {
    (submitter_id.to_string(), assignment_id.to_string())
}

/// Process-local implementation of every collaborator.
#[derive(Default)]
pub struct InMemoryStore {
    enrollments: RwLock<HashSet<Key>>,
    assignments: RwLock<HashMap<String, Assignment>>,
    submissions: RwLock<Vec<SubmissionRecord>>,
    best_scores: RwLock<HashMap<Key, BestScore>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn enroll(&self, submitter_id: &str, assignment_id: &str) {
        self.enrollments
            .write()
            .await
            .insert(key(submitter_id, assignment_id));
    }

    pub async fn put_assignment(&self, assignment: Assignment) {
        self.assignments
            .write()
            .await
            .insert(assignment.id.clone(), assignment);
    }

    pub async fn submission_count(&self) -> usize {
        self.submissions.read().await.len()
    }
}

#[async_trait]
impl EnrollmentLookup for InMemoryStore {
    async fn is_enrolled(&self, submitter_id: &str, assignment_id: &str) -> Result<bool, StoreError> {
        Ok(self
            .enrollments
            .read()
            .await
            .contains(&key(submitter_id, assignment_id)))
    }
}

#[async_trait]
impl AssignmentStore for InMemoryStore {
    async fn get_assignment(&self, assignment_id: &str) -> Result<Option<Assignment>, StoreError> {
        Ok(self.assignments.read().await.get(assignment_id).cloned())
    }
}

#[async_trait]
impl SubmissionStore for InMemoryStore {
    async fn save_submission(&self, record: SubmissionRecord) -> Result<(), StoreError> {
        let mut submissions = self.submissions.write().await;
        if submissions.iter().any(|r| r.id == record.id) {
            return Err(StoreError(format!("submission {} already exists", record.id)));
        }
        submissions.push(record);
        Ok(())
    }

    async fn count_attempts(&self, submitter_id: &str, assignment_id: &str) -> Result<u32, StoreError> {
        let count = self
            .submissions
            .read()
            .await
            .iter()
            .filter(|r| r.submitter_id == submitter_id && r.assignment_id == assignment_id)
            .count();
        Ok(count as u32)
    }

    async fn get_best_score(
        &self,
        submitter_id: &str,
        assignment_id: &str,
    ) -> Result<Option<BestScore>, StoreError> {
        Ok(self
            .best_scores
            .read()
            .await
            .get(&key(submitter_id, assignment_id))
            .cloned())
    }

    async fn upsert_best_score(&self, best: BestScore) -> Result<(), StoreError> {
        let mut scores = self.best_scores.write().await;
        let entry = scores.entry(key(&best.submitter_id, &best.assignment_id));
        match entry {
            std::collections::hash_map::Entry::Occupied(mut current) => {
                // The store itself never lowers a best score.
                if best.final_score > current.get().final_score {
                    current.insert(best);
                }
            }
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(best);
            }
        }
        Ok(())
    }

    async fn list_submissions(
        &self,
        submitter_id: &str,
        assignment_id: &str,
    ) -> Result<Vec<SubmissionRecord>, StoreError> {
        Ok(self
            .submissions
            .read()
            .await
            .iter()
            .filter(|r| r.submitter_id == submitter_id && r.assignment_id == assignment_id)
            .cloned()
            .collect())
    }
}
