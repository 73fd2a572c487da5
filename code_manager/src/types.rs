//! Request and result types for a single sandboxed run.

use serde::{Deserialize, Serialize};

use crate::container::container::PhaseOutput;

/// Exit status a process reports when killed by SIGXCPU (128 + 24).
const SIGXCPU_EXIT: i32 = 152;

/// One program execution: source, language and the limits to run it under.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExecutionRequest {
    pub source_code: String,
    pub language: String,
    #[serde(default)]
    pub stdin: String,
    pub timeout_ms: u64,
    pub memory_limit_mb: u64,
}

/// Which container produced the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Compile,
    Run,
}

/// Classification of a finished run. Everything except `Success` fails a test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    CompileError,
    RuntimeError,
    Timeout,
    ResourceExceeded,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExecutionResult {
    pub stage: Stage,
    pub stdout: String,
    pub stderr: String,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
    /// `None` when the process never reported one (killed client, lost container).
    pub exit_code: Option<i32>,
    pub wall_time_ms: u64,
    pub timed_out: bool,
    /// The memory ceiling killed the guest.
    pub oom: bool,
    /// The CPU-time ceiling killed the guest.
    pub cpu_limit_exceeded: bool,
    /// High-water mark of the container's memory use, when the host exposes it.
    pub memory_peak_kb: Option<u64>,
}

impl ExecutionResult {
    pub(crate) fn from_phase(stage: Stage, phase: PhaseOutput) -> Self {
        let cpu_limit_exceeded =
            !phase.timed_out && !phase.oom && phase.exit_code == Some(SIGXCPU_EXIT);
        let mut stderr = phase.stderr;
        if stage == Stage::Compile && phase.timed_out {
            if !stderr.is_empty() && !stderr.ends_with('\n') {
                stderr.push('\n');
            }
            stderr.push_str("compilation timed out");
        }

        Self {
            stage,
            stdout: phase.stdout,
            stderr,
            stdout_truncated: phase.stdout_truncated,
            stderr_truncated: phase.stderr_truncated,
            exit_code: phase.exit_code,
            wall_time_ms: phase.wall_time_ms,
            timed_out: phase.timed_out,
            oom: phase.oom,
            cpu_limit_exceeded,
            memory_peak_kb: phase.memory_peak_kb,
        }
    }

    pub fn status(&self) -> ExecutionStatus {
        if self.stage == Stage::Compile {
            ExecutionStatus::CompileError
        } else if self.timed_out {
            ExecutionStatus::Timeout
        } else if self.oom || self.cpu_limit_exceeded {
            ExecutionStatus::ResourceExceeded
        } else if self.exit_code == Some(0) {
            ExecutionStatus::Success
        } else {
            ExecutionStatus::RuntimeError
        }
    }

    pub fn is_success(&self) -> bool {
        self.status() == ExecutionStatus::Success
    }
}
