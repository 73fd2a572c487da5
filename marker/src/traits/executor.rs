//! Executor Trait
//!
//! The grading engine only needs "run this program with this input under these
//! limits". [`Executor`] is that seam; [`ContainerManager`] is the real
//! implementation.

use async_trait::async_trait;
use code_manager::{ContainerManager, ExecutionResult, SandboxError};
use util::languages::LanguageRecipe;

#[async_trait]
pub trait Executor: Send + Sync {
    /// Runs `source` once. Guest failures are an `Ok` result; `Err` means no
    /// trustworthy result could be produced.
    async fn run(
        &self,
        source: &str,
        recipe: &LanguageRecipe,
        stdin: &str,
        timeout_ms: u64,
        memory_limit_mb: u64,
    ) -> Result<ExecutionResult, SandboxError>;
}

#[async_trait]
impl Executor for ContainerManager {
    async fn run(
        &self,
        source: &str,
        recipe: &LanguageRecipe,
        stdin: &str,
        timeout_ms: u64,
        memory_limit_mb: u64,
    ) -> Result<ExecutionResult, SandboxError> {
        ContainerManager::run(self, source, recipe, stdin, timeout_ms, memory_limit_mb).await
    }
}
