use thiserror::Error;

/// Academic-policy rejections. The submission is not persisted and retrying
/// without changing the inputs gives the same answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("you are not enrolled for this assignment")]
    NotEnrolled,

    #[error("this assignment is not open for submissions yet")]
    NotYetAvailable,

    #[error("the hard deadline for this assignment has passed")]
    DeadlineExpired,

    #[error("the deadline has passed and late submissions are not accepted")]
    LateNotAllowed,

    #[error("all {allowed} allowed attempts have been used")]
    AttemptsExhausted { allowed: u32 },

    #[error("this assignment has no test cases configured")]
    NoTestCases,

    #[error("language '{0}' is not supported")]
    UnsupportedLanguage(String),
}

/// Failure of a persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("submission store error: {0}")]
pub struct StoreError(pub String);

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error("assignment '{0}' not found")]
    AssignmentNotFound(String),

    /// The sandbox could not grade this attempt. Nothing was persisted; a new
    /// attempt is safe.
    #[error("grading temporarily unavailable, try again")]
    GradingUnavailable,

    #[error("grading is busy, try again shortly")]
    QueueTimeout,

    #[error(transparent)]
    Store(#[from] StoreError),
}
