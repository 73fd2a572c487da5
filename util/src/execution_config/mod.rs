use serde::{Deserialize, Serialize};

/// Host-wide sandbox ceilings. Loaded once at start-up; per-run memory and
/// timeout come from the test case or language recipe instead.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ExecutionLimits {
    /// Fraction of host CPUs a single sandbox may use.
    #[serde(default = "default_max_cpus")]
    pub max_cpus: f64,

    #[serde(default = "default_max_processes")]
    pub max_processes: u32,

    /// Size of the writable `/tmp` inside the sandbox.
    #[serde(default = "default_tmpfs_size_mb")]
    pub tmpfs_size_mb: u64,

    /// stdout/stderr beyond this many bytes are dropped.
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,

    #[serde(default = "default_compile_timeout_ms")]
    pub compile_timeout_ms: u64,

    #[serde(default = "default_compile_memory_limit_mb")]
    pub compile_memory_limit_mb: u64,

    /// How long a run may wait for an admission slot.
    #[serde(default = "default_queue_timeout_ms")]
    pub queue_timeout_ms: u64,

    /// `uid:gid` the guest runs as.
    #[serde(default = "default_sandbox_user")]
    pub sandbox_user: String,

    /// How long `shutdown` waits for in-flight sandboxes.
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_cpus: default_max_cpus(),
            max_processes: default_max_processes(),
            tmpfs_size_mb: default_tmpfs_size_mb(),
            max_output_bytes: default_max_output_bytes(),
            compile_timeout_ms: default_compile_timeout_ms(),
            compile_memory_limit_mb: default_compile_memory_limit_mb(),
            queue_timeout_ms: default_queue_timeout_ms(),
            sandbox_user: default_sandbox_user(),
            drain_timeout_ms: default_drain_timeout_ms(),
        }
    }
}

/// How actual output is compared to expected output.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct OutputPolicy {
    /// Strip leading/trailing whitespace before comparing.
    #[serde(default = "default_true")]
    pub trim_whitespace: bool,

    #[serde(default = "default_true")]
    pub case_sensitive: bool,

    /// Treat any run of whitespace as a single space.
    #[serde(default)]
    pub collapse_internal_whitespace: bool,
}

impl Default for OutputPolicy {
    fn default() -> Self {
        Self {
            trim_whitespace: true,
            case_sensitive: true,
            collapse_internal_whitespace: false,
        }
    }
}

/// Per-assignment grading options.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct MarkingOptions {
    #[serde(default)]
    pub output: OutputPolicy,

    /// If false, points are only awarded when every test case passes.
    #[serde(default = "default_true")]
    pub partial_credit: bool,

    /// Used when a test case does not set its own timeout.
    #[serde(default)]
    pub default_timeout_ms: Option<u64>,

    /// Used when a test case does not set its own memory limit.
    #[serde(default)]
    pub default_memory_limit_mb: Option<u64>,

    /// Test cases of one submission run at most this many at a time.
    #[serde(default = "default_max_parallel_tests")]
    pub max_parallel_tests: usize,
}

impl Default for MarkingOptions {
    fn default() -> Self {
        Self {
            output: OutputPolicy::default(),
            partial_credit: true,
            default_timeout_ms: None,
            default_memory_limit_mb: None,
            max_parallel_tests: default_max_parallel_tests(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LatePolicy {
    /// If false: submissions after the soft deadline are rejected.
    #[serde(default)]
    pub allow_late_submissions: bool,

    /// Percent deducted per started day past the soft deadline.
    #[serde(default = "default_late_penalty_per_day")]
    pub late_penalty_per_day: u32,
}

impl Default for LatePolicy {
    fn default() -> Self {
        Self {
            allow_late_submissions: false,
            late_penalty_per_day: default_late_penalty_per_day(),
        }
    }
}

//Default Functions

fn default_true() -> bool {
    true
}

fn default_max_cpus() -> f64 {
    0.5
}

fn default_max_processes() -> u32 {
    64
}

fn default_tmpfs_size_mb() -> u64 {
    16
}

fn default_max_output_bytes() -> usize {
    64 * 1024
}

fn default_compile_timeout_ms() -> u64 {
    30_000
}

fn default_compile_memory_limit_mb() -> u64 {
    512
}

fn default_queue_timeout_ms() -> u64 {
    60_000
}

fn default_sandbox_user() -> String {
    "65534:65534".to_string()
}

fn default_drain_timeout_ms() -> u64 {
    30_000
}

fn default_max_parallel_tests() -> usize {
    1
}

fn default_late_penalty_per_day() -> u32 {
    10
}
