//! # Marker Library
//!
//! Runs a submission against an ordered list of test cases and scores it.
//!
//! ## Key Concepts
//! - **GradingJob**: one grading run for a single submission.
//! - **Executor**: the sandbox seam; [`code_manager::ContainerManager`] in production.
//! - **Comparators**: pluggable strategies deciding whether output matches.
//! - **Scorer**: aggregation of outcomes into raw score, max score and percentage.

pub mod comparators;
pub mod error;
pub mod scorer;
pub mod traits;
pub mod types;

use futures::{StreamExt, TryStreamExt, stream};
use std::time::Instant;

use crate::comparators::policy_comparator::PolicyComparator;
use crate::error::MarkerError;
use crate::traits::comparator::OutputComparator;
use crate::traits::executor::Executor;
use crate::types::{GradingResult, OutcomeError, TestCase, TestOutcome};
use code_manager::{ExecutionResult, ExecutionStatus};
use util::execution_config::MarkingOptions;
use util::languages::{LanguageRecipe, LanguageRegistry};

/// Longest diagnostic excerpt kept on an outcome.
const DETAIL_LIMIT: usize = 2048;

/// A grading run for a single submission.
///
/// # Fields
/// - `source_code`, `language`: the submission.
/// - `test_cases`: run in this order; outcomes are reported in this order.
/// - `options`: comparison policy, partial credit, default limits, parallelism.
/// - `passing_score`: raw score needed for `GradingResult::passed`. Without one,
///   every test must pass.
/// - `comparator`: strategy for comparing outputs.
pub struct GradingJob<'a> {
    source_code: String,
    language: String,
    test_cases: Vec<TestCase>,
    options: MarkingOptions,
    passing_score: Option<u32>,
    comparator: Box<dyn OutputComparator + 'a>,
}

impl<'a> GradingJob<'a> {
    pub fn new(
        source_code: impl Into<String>,
        language: impl Into<String>,
        test_cases: Vec<TestCase>,
        options: MarkingOptions,
    ) -> Self {
        Self {
            source_code: source_code.into(),
            language: language.into(),
            test_cases,
            options,
            passing_score: None,
            comparator: Box::new(PolicyComparator),
        }
    }

    pub fn with_passing_score(mut self, passing_score: u32) -> Self {
        self.passing_score = Some(passing_score);
        self
    }

    /// Set a custom output comparator strategy for this grading job.
    pub fn with_comparator<C: OutputComparator + 'a>(mut self, comparator: C) -> Self {
        self.comparator = Box::new(comparator);
        self
    }

    /// Runs every test case and aggregates the result.
    ///
    /// # Returns
    /// * `Err(MarkerError::NoTestCases)` if there is nothing to run.
    /// * `Err(MarkerError::UnsupportedLanguage)` if the registry does not know the language.
    /// * `Err(MarkerError::Infrastructure)` as soon as any test hits a sandbox failure.
    ///   Tests still in flight are dropped, which tears their sandboxes down.
    /// * `Ok(GradingResult)` otherwise, even if every test failed.
    pub async fn grade<E>(self, registry: &LanguageRegistry, executor: &E) -> Result<GradingResult, MarkerError>
    where
        E: Executor + ?Sized,
    {
        if self.test_cases.is_empty() {
            return Err(MarkerError::NoTestCases);
        }
        let recipe = registry.resolve(&self.language)?;
        let parallel = self.options.max_parallel_tests.max(1);
        let started = Instant::now();

        tracing::info!(
            language = %recipe.id,
            test_cases = self.test_cases.len(),
            parallel,
            "grading submission"
        );

        let job = &self;
        let mut outcomes: Vec<TestOutcome> = stream::iter(
            job.test_cases
                .iter()
                .map(|test_case| job.run_test(test_case, recipe, executor)),
        )
        .buffered(parallel)
        .try_collect()
        .await?;

        if !self.options.partial_credit {
            scorer::apply_all_or_nothing(&mut outcomes);
        }

        let (raw_score, max_score) = scorer::compute_score(&outcomes);
        // Sandbox time across tests, independent of how many ran at once.
        let outcomes_time_ms: u64 = outcomes.iter().map(|o| o.execution_time_ms).sum();
        let passed = match self.passing_score {
            Some(threshold) => raw_score >= threshold,
            None => outcomes.iter().all(|o| o.passed),
        };
        let result = GradingResult {
            raw_score,
            max_score,
            percentage: scorer::percentage(raw_score, max_score),
            passed,
            outcomes,
            total_execution_time_ms: outcomes_time_ms,
        };

        tracing::info!(
            raw_score,
            max_score,
            percentage = result.percentage,
            passed,
            total_execution_time_ms = result.total_execution_time_ms,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "grading finished"
        );
        Ok(result)
    }

    async fn run_test<E>(
        &self,
        test_case: &TestCase,
        recipe: &LanguageRecipe,
        executor: &E,
    ) -> Result<TestOutcome, MarkerError>
    where
        E: Executor + ?Sized,
    {
        let timeout_ms = test_case
            .timeout_ms
            .or(self.options.default_timeout_ms)
            .unwrap_or(recipe.default_timeout_ms);
        let memory_limit_mb = test_case
            .memory_limit_mb
            .or(self.options.default_memory_limit_mb)
            .unwrap_or(recipe.default_memory_limit_mb);

        let result = executor
            .run(&self.source_code, recipe, &test_case.input, timeout_ms, memory_limit_mb)
            .await
            .map_err(|e| {
                tracing::error!(test_case = %test_case.id, error = %e, "sandbox failure, aborting grading run");
                MarkerError::from(e)
            })?;

        let status = result.status();
        let passed = status == ExecutionStatus::Success
            && self.comparator.compare(&result.stdout, &test_case.expected_output, &self.options.output);

        tracing::debug!(
            test_case = %test_case.id,
            ?status,
            passed,
            wall_time_ms = result.wall_time_ms,
            "test case finished"
        );

        let error = (status != ExecutionStatus::Success).then(|| OutcomeError {
            kind: status,
            detail: (!test_case.hidden).then(|| describe_failure(&result, timeout_ms, memory_limit_mb)),
        });
        let visible = !test_case.hidden;

        Ok(TestOutcome {
            test_case_id: test_case.id.clone(),
            passed,
            awarded_points: if passed { test_case.points } else { 0 },
            possible_points: test_case.points,
            hidden: test_case.hidden,
            input: visible.then(|| test_case.input.clone()),
            expected_output: visible.then(|| test_case.expected_output.clone()),
            actual_output: visible.then(|| result.stdout.clone()),
            execution_time_ms: result.wall_time_ms,
            memory_peak_kb: result.memory_peak_kb,
            error,
        })
    }
}

fn describe_failure(result: &ExecutionResult, timeout_ms: u64, memory_limit_mb: u64) -> String {
    match result.status() {
        ExecutionStatus::Timeout => format!("time limit of {timeout_ms} ms exceeded"),
        ExecutionStatus::ResourceExceeded if result.oom => {
            format!("memory limit of {memory_limit_mb} MB exceeded")
        }
        ExecutionStatus::ResourceExceeded => "CPU time limit exceeded".to_string(),
        _ if !result.stderr.trim().is_empty() => excerpt(&result.stderr),
        _ => match result.exit_code {
            Some(code) => format!("exited with code {code}"),
            None => "terminated without an exit code".to_string(),
        },
    }
}

fn excerpt(text: &str) -> String {
    if text.len() <= DETAIL_LIMIT {
        return text.to_string();
    }
    let mut end = DETAIL_LIMIT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use code_manager::{SandboxError, Stage};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use util::execution_config::OutputPolicy;

    /// What the fake sandbox does for a given stdin.
    #[derive(Clone)]
    enum Script {
        Prints(&'static str),
        Crashes(&'static str),
        Loops,
        Oom,
        DoesNotCompile(&'static str),
        Unavailable,
    }

    /// In-process executor keyed by stdin, recording the limits it was asked for.
    struct ScriptedExecutor {
        scripts: HashMap<&'static str, (Script, u64)>,
        seen: Mutex<Vec<(String, u64, u64)>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ScriptedExecutor {
        fn new(scripts: Vec<(&'static str, Script, u64)>) -> Self {
            Self {
                scripts: scripts
                    .into_iter()
                    .map(|(stdin, script, delay)| (stdin, (script, delay)))
                    .collect(),
                seen: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    fn result(stage: Stage, stdout: &str, stderr: &str, exit: Option<i32>) -> ExecutionResult {
        ExecutionResult {
            stage,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            stdout_truncated: false,
            stderr_truncated: false,
            exit_code: exit,
            wall_time_ms: 5,
            timed_out: false,
            oom: false,
            cpu_limit_exceeded: false,
            memory_peak_kb: Some(1024),
        }
    }

    #[async_trait]
    impl Executor for ScriptedExecutor {
        async fn run(
            &self,
            _source: &str,
            _recipe: &LanguageRecipe,
            stdin: &str,
            timeout_ms: u64,
            memory_limit_mb: u64,
        ) -> Result<ExecutionResult, SandboxError> {
            self.seen
                .lock()
                .unwrap()
                .push((stdin.to_string(), timeout_ms, memory_limit_mb));
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let (script, delay) = self.scripts.get(stdin).cloned().expect("unscripted stdin");
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            Ok(match script {
                Script::Prints(out) => result(Stage::Run, out, "", Some(0)),
                Script::Crashes(err) => result(Stage::Run, "", err, Some(1)),
                Script::Loops => {
                    let mut r = result(Stage::Run, "", "", Some(137));
                    r.timed_out = true;
                    r.wall_time_ms = timeout_ms;
                    r
                }
                Script::Oom => {
                    let mut r = result(Stage::Run, "", "", Some(137));
                    r.oom = true;
                    r
                }
                Script::DoesNotCompile(err) => result(Stage::Compile, "", err, Some(1)),
                Script::Unavailable => {
                    return Err(SandboxError::BackendUnavailable("daemon down".into()));
                }
            })
        }
    }

    fn test_case(id: &str, input: &str, expected: &str, points: u32) -> TestCase {
        TestCase {
            id: id.to_string(),
            input: input.to_string(),
            expected_output: expected.to_string(),
            points,
            hidden: false,
            timeout_ms: None,
            memory_limit_mb: None,
        }
    }

    fn registry() -> LanguageRegistry {
        LanguageRegistry::builtin()
    }

    #[tokio::test]
    async fn test_two_passing_tests_score_full_marks() {
        let executor = ScriptedExecutor::new(vec![
            ("1", Script::Prints("2\n"), 0),
            ("2", Script::Prints("4\n"), 0),
        ]);
        let tests = vec![test_case("a", "1", "2", 5), test_case("b", "2", "4", 5)];

        let result = GradingJob::new("src", "python", tests, MarkingOptions::default())
            .grade(&registry(), &executor)
            .await
            .unwrap();

        assert_eq!(result.raw_score, 10);
        assert_eq!(result.max_score, 10);
        assert_eq!(result.percentage, 100.0);
        assert!(result.passed);
        assert!(result.outcomes.iter().all(|o| o.error.is_none()));
    }

    #[tokio::test]
    async fn test_infinite_loop_is_failed_timeout() {
        let executor = ScriptedExecutor::new(vec![("loop", Script::Loops, 0)]);
        let mut tc = test_case("d", "loop", "never", 3);
        tc.timeout_ms = Some(2000);

        let result = GradingJob::new("while True: pass", "python", vec![tc], MarkingOptions::default())
            .grade(&registry(), &executor)
            .await
            .unwrap();

        let outcome = &result.outcomes[0];
        assert!(!outcome.passed);
        assert_eq!(outcome.awarded_points, 0);
        let error = outcome.error.as_ref().unwrap();
        assert_eq!(error.kind, ExecutionStatus::Timeout);
        assert_eq!(error.detail.as_deref(), Some("time limit of 2000 ms exceeded"));
        assert_eq!(executor.seen.lock().unwrap()[0].1, 2000);
    }

    #[tokio::test]
    async fn test_execution_errors_are_isolated() {
        let executor = ScriptedExecutor::new(vec![
            ("crash", Script::Crashes("Traceback: boom"), 0),
            ("oom", Script::Oom, 0),
            ("ok", Script::Prints("fine"), 0),
        ]);
        let tests = vec![
            test_case("1", "crash", "x", 2),
            test_case("2", "oom", "x", 2),
            test_case("3", "ok", "fine", 2),
        ];

        let result = GradingJob::new("src", "python", tests, MarkingOptions::default())
            .grade(&registry(), &executor)
            .await
            .unwrap();

        let kinds: Vec<_> = result
            .outcomes
            .iter()
            .map(|o| o.error.as_ref().map(|e| e.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                Some(ExecutionStatus::RuntimeError),
                Some(ExecutionStatus::ResourceExceeded),
                None
            ]
        );
        assert_eq!(result.raw_score, 2);
        assert_eq!(result.percentage, 33.33);
        assert!(!result.passed);
    }

    #[tokio::test]
    async fn test_compile_error_fails_every_test() {
        let executor = ScriptedExecutor::new(vec![
            ("1", Script::DoesNotCompile("main.cpp:1: error: expected ';'"), 0),
            ("2", Script::DoesNotCompile("main.cpp:1: error: expected ';'"), 0),
        ]);
        let tests = vec![test_case("a", "1", "", 1), test_case("b", "2", "", 1)];

        let result = GradingJob::new("int main(", "cpp", tests, MarkingOptions::default())
            .grade(&registry(), &executor)
            .await
            .unwrap();

        assert_eq!(result.raw_score, 0);
        for outcome in &result.outcomes {
            let error = outcome.error.as_ref().unwrap();
            assert_eq!(error.kind, ExecutionStatus::CompileError);
            assert!(error.detail.as_ref().unwrap().contains("expected ';'"));
        }
    }

    #[tokio::test]
    async fn test_hidden_tests_are_redacted_but_scored() {
        let executor = ScriptedExecutor::new(vec![
            ("secret", Script::Prints("42"), 0),
            ("secret-crash", Script::Crashes("leaks input: secret-crash"), 0),
        ]);
        let mut hidden_pass = test_case("h1", "secret", "42", 4);
        hidden_pass.hidden = true;
        let mut hidden_fail = test_case("h2", "secret-crash", "1", 4);
        hidden_fail.hidden = true;

        let result = GradingJob::new("src", "python", vec![hidden_pass, hidden_fail], MarkingOptions::default())
            .grade(&registry(), &executor)
            .await
            .unwrap();

        assert_eq!(result.raw_score, 4);
        for outcome in &result.outcomes {
            assert!(outcome.hidden);
            assert!(outcome.input.is_none());
            assert!(outcome.expected_output.is_none());
            assert!(outcome.actual_output.is_none());
        }
        let error = result.outcomes[1].error.as_ref().unwrap();
        assert_eq!(error.kind, ExecutionStatus::RuntimeError);
        assert!(error.detail.is_none());
    }

    #[tokio::test]
    async fn test_zero_test_cases_is_configuration_error() {
        let executor = ScriptedExecutor::new(vec![]);
        let err = GradingJob::new("src", "python", vec![], MarkingOptions::default())
            .grade(&registry(), &executor)
            .await
            .unwrap_err();
        assert!(matches!(err, MarkerError::NoTestCases));
    }

    #[tokio::test]
    async fn test_unknown_language_is_rejected() {
        let executor = ScriptedExecutor::new(vec![]);
        let err = GradingJob::new("src", "cobol", vec![test_case("a", "1", "1", 1)], MarkingOptions::default())
            .grade(&registry(), &executor)
            .await
            .unwrap_err();
        assert!(matches!(err, MarkerError::UnsupportedLanguage(_)));
    }

    #[tokio::test]
    async fn test_infrastructure_error_aborts_run() {
        let executor = ScriptedExecutor::new(vec![
            ("1", Script::Prints("1"), 0),
            ("2", Script::Unavailable, 0),
            ("3", Script::Prints("3"), 0),
        ]);
        let tests = vec![
            test_case("a", "1", "1", 1),
            test_case("b", "2", "2", 1),
            test_case("c", "3", "3", 1),
        ];

        let err = GradingJob::new("src", "python", tests, MarkingOptions::default())
            .grade(&registry(), &executor)
            .await
            .unwrap_err();
        assert!(matches!(err, MarkerError::Infrastructure(SandboxError::BackendUnavailable(_))));
        // Sequential: the third test never ran.
        assert_eq!(executor.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_without_partial_credit_one_failure_zeroes_everything() {
        let executor = ScriptedExecutor::new(vec![
            ("1", Script::Prints("1"), 0),
            ("2", Script::Prints("wrong"), 0),
        ]);
        let tests = vec![test_case("a", "1", "1", 5), test_case("b", "2", "2", 5)];
        let options = MarkingOptions {
            partial_credit: false,
            ..MarkingOptions::default()
        };

        let result = GradingJob::new("src", "python", tests, options)
            .grade(&registry(), &executor)
            .await
            .unwrap();
        assert_eq!(result.raw_score, 0);
        assert_eq!(result.max_score, 10);
        assert!(result.outcomes[0].passed);
        assert_eq!(result.outcomes[0].awarded_points, 0);
    }

    #[tokio::test]
    async fn test_limits_fall_back_to_options_then_recipe() {
        let executor = ScriptedExecutor::new(vec![
            ("own", Script::Prints(""), 0),
            ("default", Script::Prints(""), 0),
        ]);
        let mut own = test_case("a", "own", "", 1);
        own.timeout_ms = Some(500);
        own.memory_limit_mb = Some(32);
        let default = test_case("b", "default", "", 1);
        let options = MarkingOptions {
            default_timeout_ms: Some(3000),
            ..MarkingOptions::default()
        };

        GradingJob::new("src", "python", vec![own, default], options)
            .grade(&registry(), &executor)
            .await
            .unwrap();

        let recipe_memory = registry().resolve("python").unwrap().default_memory_limit_mb;
        let seen = executor.seen.lock().unwrap();
        assert_eq!(seen[0], ("own".to_string(), 500, 32));
        assert_eq!(seen[1], ("default".to_string(), 3000, recipe_memory));
    }

    #[tokio::test]
    async fn test_parallel_outcomes_keep_test_order() {
        let executor = ScriptedExecutor::new(vec![
            ("slow", Script::Prints("slow"), 80),
            ("mid", Script::Prints("mid"), 40),
            ("fast", Script::Prints("fast"), 0),
        ]);
        let tests = vec![
            test_case("1", "slow", "slow", 1),
            test_case("2", "mid", "mid", 1),
            test_case("3", "fast", "fast", 1),
        ];
        let options = MarkingOptions {
            max_parallel_tests: 3,
            ..MarkingOptions::default()
        };

        let result = GradingJob::new("src", "python", tests, options)
            .grade(&registry(), &executor)
            .await
            .unwrap();

        let ids: Vec<_> = result.outcomes.iter().map(|o| o.test_case_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert!(executor.max_in_flight.load(Ordering::SeqCst) > 1);
        assert_eq!(result.raw_score, 3);
        // Summed per test, not the overlapping wall clock.
        assert_eq!(result.total_execution_time_ms, 15);
    }

    #[tokio::test]
    async fn test_grading_is_idempotent() {
        let executor = ScriptedExecutor::new(vec![
            ("1", Script::Prints("HELLO  world\r\n"), 0),
            ("2", Script::Crashes("boom"), 0),
        ]);
        let options = MarkingOptions {
            output: OutputPolicy {
                trim_whitespace: true,
                case_sensitive: false,
                collapse_internal_whitespace: true,
            },
            ..MarkingOptions::default()
        };
        let tests = vec![test_case("a", "1", "hello world", 3), test_case("b", "2", "", 2)];

        let first = GradingJob::new("src", "python", tests.clone(), options.clone())
            .grade(&registry(), &executor)
            .await
            .unwrap();
        let second = GradingJob::new("src", "python", tests, options)
            .grade(&registry(), &executor)
            .await
            .unwrap();

        assert_eq!(first.outcomes, second.outcomes);
        assert_eq!(first.raw_score, 3);
        assert_eq!(first.raw_score, second.raw_score);
    }

    #[tokio::test]
    async fn test_passing_score_threshold() {
        let executor = ScriptedExecutor::new(vec![
            ("1", Script::Prints("1"), 0),
            ("2", Script::Prints("nope"), 0),
        ]);
        let tests = vec![test_case("a", "1", "1", 6), test_case("b", "2", "2", 4)];

        let result = GradingJob::new("src", "python", tests, MarkingOptions::default())
            .with_passing_score(5)
            .grade(&registry(), &executor)
            .await
            .unwrap();
        assert!(result.passed);
        assert_eq!(result.raw_score, 6);
    }

    #[test]
    fn test_excerpt_respects_char_boundaries() {
        let long = "é".repeat(DETAIL_LIMIT);
        let cut = excerpt(&long);
        assert!(cut.ends_with("..."));
        assert!(cut.len() <= DETAIL_LIMIT + 3);
    }

    #[tokio::test]
    async fn test_custom_comparator_replaces_policy() {
        let executor = ScriptedExecutor::new(vec![("1", Script::Prints("42\n"), 0)]);
        let tests = vec![test_case("strict", "1", "42", 4)];

        let lenient = GradingJob::new("src", "python", tests.clone(), MarkingOptions::default())
            .grade(&registry(), &executor)
            .await
            .unwrap();
        assert!(lenient.passed);

        let strict = GradingJob::new("src", "python", tests, MarkingOptions::default())
            .with_comparator(crate::comparators::exact_comparator::ExactComparator)
            .grade(&registry(), &executor)
            .await
            .unwrap();
        assert!(!strict.passed);
        assert_eq!(strict.raw_score, 0);
    }
}
