// manager/manager.rs
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use uuid::Uuid;

use crate::container::container::{run_container, ContainerSpec};
use crate::container::monitor::DEFAULT_CGROUP_ROOT;
use crate::container::workspace::Workspace;
use crate::error::SandboxError;
use crate::manager::queue::{AdmissionControl, QueueStats};
use crate::types::{ExecutionRequest, ExecutionResult, Stage};
use util::config::AppConfig;
use util::execution_config::ExecutionLimits;
use util::languages::{LanguageRecipe, LanguageRegistry};

/// Smallest memory limit docker accepts.
const MIN_MEMORY_MB: u64 = 6;

/// Runs untrusted programs in disposable containers, at most `max_concurrent`
/// at a time across every clone of the manager.
#[derive(Clone)]
pub struct ContainerManager {
    admission: Arc<AdmissionControl>,
    limits: Arc<ExecutionLimits>,
    registry: Arc<LanguageRegistry>,
    scratch_root: PathBuf,
    cgroup_root: PathBuf,
    docker_bin: PathBuf,
}

impl ContainerManager {
    pub fn new(max_concurrent: usize, limits: ExecutionLimits, registry: LanguageRegistry) -> Self {
        Self {
            admission: AdmissionControl::new(max_concurrent),
            limits: Arc::new(limits),
            registry: Arc::new(registry),
            scratch_root: std::env::temp_dir(),
            cgroup_root: PathBuf::from(DEFAULT_CGROUP_ROOT),
            docker_bin: PathBuf::from("docker"),
        }
    }

    pub fn from_config(config: &AppConfig, limits: ExecutionLimits, registry: LanguageRegistry) -> Self {
        Self::new(config.max_number_containers, limits, registry)
            .with_scratch_root(config.sandbox_scratch_root.clone())
            .with_docker_bin(&config.docker_bin)
    }

    pub fn with_scratch_root(mut self, root: PathBuf) -> Self {
        self.scratch_root = root;
        self
    }

    pub fn with_cgroup_root(mut self, root: PathBuf) -> Self {
        self.cgroup_root = root;
        self
    }

    pub fn with_docker_bin<P: AsRef<Path>>(mut self, docker: P) -> Self {
        self.docker_bin = docker.as_ref().to_path_buf();
        self
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }

    pub fn limits(&self) -> &ExecutionLimits {
        &self.limits
    }

    pub fn stats(&self) -> QueueStats {
        self.admission.stats()
    }

    /// Resolves the language and runs the request.
    pub async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult, SandboxError> {
        let recipe = self.registry.resolve(&request.language)?;
        self.run(
            &request.source_code,
            recipe,
            &request.stdin,
            request.timeout_ms,
            request.memory_limit_mb,
        )
        .await
    }

    /// Compiles (if the recipe needs it) and runs `source` with `stdin`.
    ///
    /// Guest failures come back as an [`ExecutionResult`]; an `Err` means the
    /// sandbox could not produce a trustworthy result. Dropping the returned future
    /// kills and removes any container it started.
    pub async fn run(
        &self,
        source: &str,
        recipe: &LanguageRecipe,
        stdin: &str,
        timeout_ms: u64,
        memory_limit_mb: u64,
    ) -> Result<ExecutionResult, SandboxError> {
        let _slot = self
            .admission
            .acquire(Duration::from_millis(self.limits.queue_timeout_ms))
            .await?;

        let workspace = Workspace::create(&self.scratch_root, recipe, source)?;
        let run_id = Uuid::new_v4().simple().to_string();
        tracing::info!(language = %recipe.id, %run_id, timeout_ms, memory_limit_mb, "starting sandboxed run");

        if let Some(compile) = recipe.render_compile() {
            let spec = self.container_spec(
                &workspace,
                recipe,
                Stage::Compile,
                &run_id,
                compile,
                self.limits.compile_memory_limit_mb,
                self.limits.compile_timeout_ms,
            );
            let phase = run_container(
                &self.docker_bin,
                &self.cgroup_root,
                &spec,
                b"",
                Duration::from_millis(self.limits.compile_timeout_ms),
                self.limits.max_output_bytes,
            )
            .await?;

            if phase.timed_out || phase.exit_code != Some(0) {
                tracing::info!(language = %recipe.id, %run_id, exit_code = ?phase.exit_code, "compilation failed");
                workspace.close();
                return Ok(ExecutionResult::from_phase(Stage::Compile, phase));
            }
        }

        let spec = self.container_spec(
            &workspace,
            recipe,
            Stage::Run,
            &run_id,
            recipe.render_run(),
            memory_limit_mb,
            timeout_ms,
        );
        let phase = run_container(
            &self.docker_bin,
            &self.cgroup_root,
            &spec,
            stdin.as_bytes(),
            Duration::from_millis(timeout_ms.max(1)),
            self.limits.max_output_bytes,
        )
        .await?;
        workspace.close();

        let result = ExecutionResult::from_phase(Stage::Run, phase);
        tracing::info!(%run_id, status = ?result.status(), wall_time_ms = result.wall_time_ms, "sandboxed run finished");
        Ok(result)
    }

    #[allow(clippy::too_many_arguments)]
    fn container_spec(
        &self,
        workspace: &Workspace,
        recipe: &LanguageRecipe,
        stage: Stage,
        run_id: &str,
        command: String,
        memory_limit_mb: u64,
        timeout_ms: u64,
    ) -> ContainerSpec {
        let stage_name = match stage {
            Stage::Compile => "compile",
            Stage::Run => "run",
        };
        ContainerSpec {
            name: format!("grader-{stage_name}-{run_id}"),
            image: recipe.container_image.clone(),
            command,
            source_dir: workspace.source_dir().to_path_buf(),
            build_dir: workspace.build_dir().to_path_buf(),
            build_writable: stage == Stage::Compile,
            cidfile: workspace.cidfile(stage_name),
            memory_limit_mb: memory_limit_mb.max(MIN_MEMORY_MB),
            cpus: self.limits.max_cpus,
            pids_limit: self.limits.max_processes,
            tmpfs_size_mb: self.limits.tmpfs_size_mb,
            cpu_seconds: cpu_seconds_for(timeout_ms),
            user: self.limits.sandbox_user.clone(),
        }
    }

    /// Checks that the docker daemon answers.
    pub async fn check_backend(&self) -> Result<String, SandboxError> {
        let output = Command::new(&self.docker_bin)
            .args(["version", "--format", "{{.Server.Version}}"])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| SandboxError::BackendUnavailable(format!("cannot run {}: {e}", self.docker_bin.display())))?;

        if !output.status.success() {
            return Err(SandboxError::BackendUnavailable(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        tracing::info!(%version, "docker backend reachable");
        Ok(version)
    }

    /// Pulls every image the registry references that is not present locally.
    /// Runs never pull, so this is the only place images are fetched.
    pub async fn ensure_images(&self) -> Result<(), SandboxError> {
        for image in self.registry.images() {
            let present = Command::new(&self.docker_bin)
                .args(["image", "inspect", &image])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
                .map_err(SandboxError::Spawn)?;
            if present.success() {
                continue;
            }

            tracing::info!(%image, "pulling sandbox image");
            let pulled = Command::new(&self.docker_bin)
                .args(["pull", &image])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
                .map_err(SandboxError::Spawn)?;
            if !pulled.success() {
                return Err(SandboxError::ImageMissing(image));
            }
        }
        Ok(())
    }

    /// Stops admitting runs and waits for in-flight ones to finish.
    pub async fn shutdown(&self) -> bool {
        self.admission.close();
        let limit = Duration::from_millis(self.limits.drain_timeout_ms);
        let drained = self.admission.wait_idle(limit).await;
        if drained {
            tracing::info!("all sandboxes drained");
        } else {
            tracing::warn!(?limit, "sandboxes still running after drain timeout");
        }
        drained
    }
}

/// CPU-time ceiling for a wall-clock timeout, in whole seconds, at least one.
fn cpu_seconds_for(timeout_ms: u64) -> u64 {
    timeout_ms.div_ceil(1000).max(1)
}
