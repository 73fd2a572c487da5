// container/guard.rs
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;

/// Owns a named container until it is removed.
///
/// Removal is normally explicit through [`ContainerGuard::remove`]. If the owning
/// future is cancelled first, `Drop` issues a best-effort `docker rm -f`.
pub struct ContainerGuard {
    docker: PathBuf,
    name: String,
    removed: bool,
}

/// Post-mortem state reported by `docker inspect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InspectState {
    pub oom_killed: bool,
    pub exit_code: Option<i32>,
    /// False when the container was created but its process never started.
    pub started: bool,
}

pub const INSPECT_FORMAT: &str = "{{.State.OOMKilled}}|{{.State.ExitCode}}|{{.State.StartedAt}}";

/// Parses one line of `docker inspect --format INSPECT_FORMAT`.
pub fn parse_inspect(line: &str) -> Option<InspectState> {
    let mut parts = line.trim().splitn(3, '|');
    let oom_killed = match parts.next()? {
        "true" => true,
        "false" => false,
        _ => return None,
    };
    let exit_code = parts.next()?.parse::<i32>().ok();
    let started_at = parts.next().unwrap_or_default();
    // Docker leaves the zero time in StartedAt for containers that never ran.
    let started = !started_at.is_empty() && !started_at.starts_with("0001-01-01");

    Some(InspectState {
        oom_killed,
        exit_code,
        started,
    })
}

impl ContainerGuard {
    pub fn new(docker: PathBuf, name: String) -> Self {
        Self {
            docker,
            name,
            removed: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sends SIGKILL to the guest. Errors are logged; the container may already be gone.
    pub async fn kill(&self) {
        let status = Command::new(&self.docker)
            .args(["kill", &self.name])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        if let Err(e) = status {
            tracing::warn!(container = %self.name, error = %e, "docker kill failed");
        }
    }

    pub async fn inspect(&self) -> Option<InspectState> {
        let output = Command::new(&self.docker)
            .args(["inspect", "--format", INSPECT_FORMAT, &self.name])
            .stdin(Stdio::null())
            .output()
            .await
            .ok()?;
        if !output.status.success() {
            return None;
        }
        parse_inspect(&String::from_utf8_lossy(&output.stdout))
    }

    pub async fn remove(mut self) {
        self.removed = true;
        let result = Command::new(&self.docker)
            .args(["rm", "-f", &self.name])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        match result {
            Ok(status) if status.success() => {
                tracing::debug!(container = %self.name, "container removed");
            }
            Ok(status) => {
                tracing::warn!(container = %self.name, %status, "docker rm returned failure");
            }
            Err(e) => {
                tracing::warn!(container = %self.name, error = %e, "docker rm failed");
            }
        }
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        let docker = self.docker.clone();
        let name = std::mem::take(&mut self.name);
        tracing::debug!(container = %name, "removing container from drop");

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let _ = Command::new(&docker)
                        .args(["rm", "-f", &name])
                        .stdout(Stdio::null())
                        .stderr(Stdio::null())
                        .status()
                        .await;
                });
            }
            Err(_) => {
                let _ = std::process::Command::new(&docker)
                    .args(["rm", "-f", &name])
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .status();
            }
        }
    }
}
