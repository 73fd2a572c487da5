//! Submission policy engine.
//!
//! [`assignment_submission_service::SubmissionService`] is the entry point: it
//! checks enrollment, deadlines and attempt limits, hands the submission to the
//! grading engine, applies the late penalty and records the attempt.

pub mod assignment;
pub mod assignment_submission;
pub mod assignment_submission_service;
pub mod clock;
pub mod error;
pub mod late_penalty;
pub mod memory_repository;
pub mod repository;
