// error.rs
use std::time::Duration;
use thiserror::Error;
use util::languages::UnsupportedLanguage;

/// Failures of the sandbox itself, as opposed to failures of the guest program.
///
/// A guest that does not compile, crashes, runs out of time or memory still
/// produces an [`crate::types::ExecutionResult`]; these errors mean no trustworthy
/// result could be produced at all.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("sandbox backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("container image '{0}' is not available")]
    ImageMissing(String),

    #[error("failed to prepare sandbox workspace: {0}")]
    Workspace(#[from] std::io::Error),

    #[error("failed to run docker client: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("timed out after {0:?} waiting for a sandbox slot")]
    QueueTimeout(Duration),

    #[error("sandbox manager is shutting down")]
    ShuttingDown,

    #[error(transparent)]
    UnsupportedLanguage(#[from] UnsupportedLanguage),
}

impl SandboxError {
    /// True for errors caused by the sandbox host rather than by the request.
    pub fn is_infrastructure(&self) -> bool {
        !matches!(self, SandboxError::UnsupportedLanguage(_))
    }
}
