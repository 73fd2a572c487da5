//! Marker Error Types
//!
//! [`MarkerError`] covers the ways a grading run can fail as a whole. A test that
//! fails to compile, crashes or times out is not an error; it is a failed
//! [`crate::types::TestOutcome`].
//!
//! # Example
//!
//! ```rust
//! use marker::error::MarkerError;
//!
//! fn check(tests: &[u32]) -> Result<(), MarkerError> {
//!     if tests.is_empty() {
//!         return Err(MarkerError::NoTestCases);
//!     }
//!     Ok(())
//! }
//! ```

use code_manager::SandboxError;
use thiserror::Error;
use util::languages::UnsupportedLanguage;

#[derive(Debug, Error)]
pub enum MarkerError {
    /// The assignment defines no test cases; a score would be meaningless.
    #[error("no test cases configured")]
    NoTestCases,

    #[error(transparent)]
    UnsupportedLanguage(#[from] UnsupportedLanguage),

    /// The sandbox could not run a test. Fatal for the whole run.
    #[error("sandbox infrastructure failure: {0}")]
    Infrastructure(#[source] SandboxError),
}

impl From<SandboxError> for MarkerError {
    fn from(err: SandboxError) -> Self {
        match err {
            SandboxError::UnsupportedLanguage(e) => MarkerError::UnsupportedLanguage(e),
            other => MarkerError::Infrastructure(other),
        }
    }
}
