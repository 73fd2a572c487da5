// container/monitor.rs
//! Samples a container's memory high-water mark from the host cgroup tree.
//!
//! Docker does not report peak memory after exit, so a background task polls the
//! container's cgroup while it runs and keeps the largest value seen. Both the
//! systemd (cgroup v2) and cgroupfs (v1 and v2) layouts are detected.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;

pub const DEFAULT_CGROUP_ROOT: &str = "/sys/fs/cgroup";
const POLL_INTERVAL: Duration = Duration::from_millis(20);

pub struct MemoryMonitor {
    peak_bytes: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl MemoryMonitor {
    /// Starts polling. The container id is read from `cidfile` once docker writes it.
    pub fn start(cgroup_root: PathBuf, cidfile: PathBuf) -> Self {
        let peak_bytes = Arc::new(AtomicU64::new(0));
        let peak = Arc::clone(&peak_bytes);

        let task = tokio::spawn(async move {
            let mut candidates: Option<Vec<PathBuf>> = None;
            loop {
                if candidates.is_none() {
                    if let Ok(id) = tokio::fs::read_to_string(&cidfile).await {
                        let id = id.trim();
                        if !id.is_empty() {
                            candidates = Some(cgroup_memory_files(&cgroup_root, id));
                        }
                    }
                }
                if let Some(files) = &candidates {
                    for file in files {
                        if let Some(bytes) = read_counter(file).await {
                            peak.fetch_max(bytes, Ordering::Relaxed);
                        }
                    }
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        });

        Self { peak_bytes, task }
    }

    /// Stops polling and returns the peak in kilobytes, if anything was observed.
    pub fn finish(self) -> Option<u64> {
        self.task.abort();
        match self.peak_bytes.load(Ordering::Relaxed) {
            0 => None,
            bytes => Some(bytes.div_ceil(1024)),
        }
    }
}

impl Drop for MemoryMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub fn cgroup_memory_files(root: &Path, container_id: &str) -> Vec<PathBuf> {
    let systemd = root
        .join("system.slice")
        .join(format!("docker-{container_id}.scope"));
    let cgroupfs = root.join("docker").join(container_id);
    vec![
        systemd.join("memory.peak"),
        systemd.join("memory.current"),
        cgroupfs.join("memory.peak"),
        cgroupfs.join("memory.current"),
        root.join("memory")
            .join("docker")
            .join(container_id)
            .join("memory.max_usage_in_bytes"),
    ]
}

async fn read_counter(path: &Path) -> Option<u64> {
    tokio::fs::read_to_string(path).await.ok()?.trim().parse().ok()
}
