use util::execution_config::OutputPolicy;

/// OutputComparator is a strategy trait for deciding whether a test passed.
///
/// Implementations must be pure: the same inputs always give the same verdict.
pub trait OutputComparator: Send + Sync {
    /// - `actual`: what the program wrote to stdout.
    /// - `expected`: the test case's expected output.
    /// - `policy`: normalisation options for this assignment.
    fn compare(&self, actual: &str, expected: &str, policy: &OutputPolicy) -> bool;
}
