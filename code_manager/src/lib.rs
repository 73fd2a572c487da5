//! Sandboxed code execution.
//!
//! [`manager::manager::ContainerManager`] is the entry point: it admits a run
//! through the global [`manager::queue::AdmissionControl`], materialises a private
//! workspace, and executes the program in throwaway Docker containers with network,
//! filesystem, memory, CPU and process limits. Every exit path tears the container
//! and the workspace down.

pub mod api;
pub mod container;
pub mod error;
pub mod manager;
pub mod types;
pub mod utils;

pub use error::SandboxError;
pub use manager::manager::ContainerManager;
pub use types::{ExecutionRequest, ExecutionResult, ExecutionStatus, Stage};
