// container/container.rs
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

use crate::container::guard::ContainerGuard;
use crate::container::monitor::MemoryMonitor;
use crate::container::output::{read_bounded, CapturedOutput};
use crate::error::SandboxError;
use util::languages::{BUILD_MOUNT, SOURCE_MOUNT};

/// Docker reserves 125 for failures of the daemon/client rather than the guest.
const DOCKER_CLIENT_ERROR: i32 = 125;
/// Grace period for the docker client to exit after `docker kill`.
const KILL_GRACE: Duration = Duration::from_secs(5);

/// Everything needed to start one locked-down container.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    /// Shell command run inside the guest.
    pub command: String,
    pub source_dir: PathBuf,
    pub build_dir: PathBuf,
    /// Only the compile container may write to the build directory.
    pub build_writable: bool,
    pub cidfile: PathBuf,
    pub memory_limit_mb: u64,
    pub cpus: f64,
    pub pids_limit: u32,
    pub tmpfs_size_mb: u64,
    pub cpu_seconds: u64,
    pub user: String,
}

/// Raw outcome of one container, before it is classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseOutput {
    pub stdout: String,
    pub stderr: String,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
    pub exit_code: Option<i32>,
    pub wall_time_ms: u64,
    pub timed_out: bool,
    pub oom: bool,
    pub memory_peak_kb: Option<u64>,
}

/// Arguments for `docker run`. No network, read-only root, bounded tmpfs, no
/// capabilities, unprivileged user, memory without swap.
pub fn docker_run_args(spec: &ContainerSpec) -> Vec<String> {
    let build_mode = if spec.build_writable { "rw" } else { "ro" };
    vec![
        "run".to_string(),
        "-i".to_string(),
        "--init".to_string(),
        "--pull=never".to_string(),
        format!("--name={}", spec.name),
        format!("--cidfile={}", spec.cidfile.display()),
        "--network=none".to_string(),
        "--read-only".to_string(),
        "--tmpfs".to_string(),
        format!("/tmp:rw,nosuid,size={}m", spec.tmpfs_size_mb),
        format!("--memory={}m", spec.memory_limit_mb),
        format!("--memory-swap={}m", spec.memory_limit_mb),
        format!("--cpus={}", spec.cpus),
        format!("--pids-limit={}", spec.pids_limit),
        "--ulimit".to_string(),
        format!("cpu={}:{}", spec.cpu_seconds, spec.cpu_seconds + 1),
        "--cap-drop=ALL".to_string(),
        "--security-opt=no-new-privileges".to_string(),
        format!("--user={}", spec.user),
        "-e".to_string(),
        "HOME=/tmp".to_string(),
        "-w".to_string(),
        SOURCE_MOUNT.to_string(),
        "-v".to_string(),
        format!("{}:{}:ro", spec.source_dir.display(), SOURCE_MOUNT),
        "-v".to_string(),
        format!("{}:{}:{}", spec.build_dir.display(), BUILD_MOUNT, build_mode),
        spec.image.clone(),
        "sh".to_string(),
        "-c".to_string(),
        format!("exec {}", spec.command),
    ]
}

fn is_missing_image(stderr: &str) -> bool {
    ["Unable to find image", "No such image", "pull access denied"]
        .iter()
        .any(|needle| stderr.contains(needle))
}

/// Runs one container to completion under a wall-clock `limit`.
///
/// Guest failures (non-zero exit, OOM, timeout) are reported in the returned
/// [`PhaseOutput`]; only failures of docker itself become errors. The container is
/// removed before returning, and also if this future is dropped.
pub async fn run_container(
    docker: &Path,
    cgroup_root: &Path,
    spec: &ContainerSpec,
    stdin: &[u8],
    limit: Duration,
    max_output_bytes: usize,
) -> Result<PhaseOutput, SandboxError> {
    let mut child = Command::new(docker)
        .args(docker_run_args(spec))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(SandboxError::Spawn)?;

    let guard = ContainerGuard::new(docker.to_path_buf(), spec.name.clone());
    let monitor = MemoryMonitor::start(cgroup_root.to_path_buf(), spec.cidfile.clone());
    let started = Instant::now();

    if let Some(mut pipe) = child.stdin.take() {
        let input = stdin.to_vec();
        tokio::spawn(async move {
            // The guest may exit without reading; a broken pipe is expected then.
            let _ = pipe.write_all(&input).await;
            let _ = pipe.shutdown().await;
        });
    }
    let stdout_task = child
        .stdout
        .take()
        .map(|pipe| tokio::spawn(read_bounded(pipe, max_output_bytes)));
    let stderr_task = child
        .stderr
        .take()
        .map(|pipe| tokio::spawn(read_bounded(pipe, max_output_bytes)));

    let (status, timed_out) = match timeout(limit, child.wait()).await {
        Ok(status) => (status.map_err(SandboxError::Spawn)?, false),
        Err(_) => {
            tracing::info!(container = %guard.name(), ?limit, "wall-clock limit reached, killing");
            guard.kill().await;
            let status = match timeout(KILL_GRACE, child.wait()).await {
                Ok(status) => status.map_err(SandboxError::Spawn)?,
                Err(_) => {
                    let _ = child.kill().await;
                    child.wait().await.map_err(SandboxError::Spawn)?
                }
            };
            (status, true)
        }
    };
    let wall_time_ms = started.elapsed().as_millis() as u64;

    let stdout = collect(stdout_task).await;
    let stderr = collect(stderr_task).await;
    let memory_peak_kb = monitor.finish();
    let inspect = guard.inspect().await;

    if let Some(err) = infrastructure_failure(&status, inspect.map(|s| s.started), &stderr.text, &spec.image) {
        tracing::error!(container = %guard.name(), error = %err, "container failed to start");
        guard.remove().await;
        return Err(err);
    }

    let exit_code = inspect
        .and_then(|s| s.exit_code)
        .or_else(|| status.code());
    let oom = inspect.map(|s| s.oom_killed).unwrap_or(false);
    guard.remove().await;

    tracing::debug!(
        container = %spec.name,
        ?exit_code,
        wall_time_ms,
        timed_out,
        oom,
        ?memory_peak_kb,
        "container finished"
    );

    Ok(PhaseOutput {
        stdout: stdout.text,
        stderr: stderr.text,
        stdout_truncated: stdout.truncated,
        stderr_truncated: stderr.truncated,
        exit_code,
        wall_time_ms,
        timed_out,
        oom,
        memory_peak_kb,
    })
}

async fn collect(
    task: Option<tokio::task::JoinHandle<std::io::Result<CapturedOutput>>>,
) -> CapturedOutput {
    match task {
        Some(handle) => match handle.await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "failed reading container output");
                CapturedOutput::default()
            }
            Err(e) => {
                tracing::warn!(error = %e, "output reader task failed");
                CapturedOutput::default()
            }
        },
        None => CapturedOutput::default(),
    }
}

/// Exit 125 from the client is only an infrastructure failure if the guest never
/// started; a guest is free to exit with 125 itself.
fn infrastructure_failure(
    status: &ExitStatus,
    started: Option<bool>,
    stderr: &str,
    image: &str,
) -> Option<SandboxError> {
    if status.code() != Some(DOCKER_CLIENT_ERROR) || started == Some(true) {
        return None;
    }
    if is_missing_image(stderr) {
        Some(SandboxError::ImageMissing(image.to_string()))
    } else {
        Some(SandboxError::BackendUnavailable(stderr.trim().to_string()))
    }
}
