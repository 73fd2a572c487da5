// tests/run_code.rs
//
// These talk to a real docker daemon with the built-in images pulled.
// Run with `cargo test -p code_manager -- --ignored`.

use code_manager::manager::manager::ContainerManager;
use code_manager::types::{ExecutionRequest, ExecutionStatus, Stage};
use std::time::{Duration, Instant};
use util::execution_config::ExecutionLimits;
use util::languages::LanguageRegistry;

fn manager() -> ContainerManager {
    ContainerManager::new(2, ExecutionLimits::default(), LanguageRegistry::builtin())
}

fn request(language: &str, source: &str, stdin: &str, timeout_ms: u64) -> ExecutionRequest {
    ExecutionRequest {
        source_code: source.to_string(),
        language: language.to_string(),
        stdin: stdin.to_string(),
        timeout_ms,
        memory_limit_mb: 128,
    }
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_python_reads_stdin() {
    let result = manager()
        .execute(&request("python", "print(int(input()) * 2)", "21\n", 10_000))
        .await
        .expect("sandbox should be available");

    assert_eq!(result.status(), ExecutionStatus::Success);
    assert_eq!(result.stdout.trim(), "42");
    assert!(result.memory_peak_kb.is_some());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_infinite_loop_times_out() {
    let start = Instant::now();
    let result = manager()
        .execute(&request("python", "while True:\n    pass\n", "", 2000))
        .await
        .unwrap();

    assert!(result.timed_out);
    assert_eq!(result.status(), ExecutionStatus::Timeout);
    assert!(start.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_cpp_compile_error_is_reported() {
    let result = manager()
        .execute(&request("cpp", "int main( { return 0; }", "", 5000))
        .await
        .unwrap();

    assert_eq!(result.stage, Stage::Compile);
    assert_eq!(result.status(), ExecutionStatus::CompileError);
    assert!(!result.stderr.is_empty());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_java_compiles_and_runs() {
    let source = "public class Main { public static void main(String[] a) { System.out.println(\"Hello from Java Main\"); } }";
    let result = manager()
        .execute(&request("java", source, "", 15_000))
        .await
        .unwrap();

    assert_eq!(result.stage, Stage::Run);
    assert_eq!(result.stdout.trim(), "Hello from Java Main");
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_network_is_blocked() {
    let source = "import socket\ntry:\n    socket.create_connection(('1.1.1.1', 80), timeout=2)\n    print('connected')\nexcept OSError:\n    print('blocked')\n";
    let result = manager()
        .execute(&request("python", source, "", 10_000))
        .await
        .unwrap();
    assert_eq!(result.stdout.trim(), "blocked");
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_writes_outside_tmp_fail() {
    let source = "try:\n    open('/workspace/evil.txt', 'w').write('x')\n    print('wrote')\nexcept OSError:\n    print('denied')\nopen('/tmp/ok.txt', 'w').write('x')\nprint('tmp ok')\n";
    let result = manager()
        .execute(&request("python", source, "", 10_000))
        .await
        .unwrap();
    assert_eq!(result.stdout, "denied\ntmp ok\n");
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_memory_hog_is_resource_exceeded() {
    let source = "x = b'a' * (256 * 1024 * 1024)\nprint(len(x))\n";
    let mut req = request("python", source, "", 10_000);
    req.memory_limit_mb = 32;
    let result = manager().execute(&req).await.unwrap();
    assert!(result.oom);
    assert_eq!(result.status(), ExecutionStatus::ResourceExceeded);
}
