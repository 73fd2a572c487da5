//utils/config_management.rs
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use util::execution_config::ExecutionLimits;

#[derive(Debug, Error)]
pub enum LimitsFileError {
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in config file {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("config file {path:?}: max_cpus, max_processes and max_output_bytes must be positive")]
    NonPositive { path: PathBuf },
}

/// Loads `ExecutionLimits` from a JSON file. Missing keys take their defaults.
///
/// # Returns
/// - `Ok(ExecutionLimits::default())` if nothing exists at `path`.
/// - `Ok(ExecutionLimits)` if the file is found and successfully parsed.
/// - `Err(LimitsFileError)` if the file cannot be read, is not valid JSON or
///   sets a ceiling to zero.
pub fn load_execution_limits_from_json<P: AsRef<Path>>(
    path: P,
) -> Result<ExecutionLimits, LimitsFileError> {
    let path_ref = path.as_ref();

    if !path_ref.exists() {
        tracing::warn!(path = %path_ref.display(), "execution config file not found, using defaults");
        return Ok(ExecutionLimits::default());
    }

    let content = fs::read_to_string(path_ref).map_err(|source| LimitsFileError::Read {
        path: path_ref.to_path_buf(),
        source,
    })?;

    let limits: ExecutionLimits =
        serde_json::from_str(&content).map_err(|source| LimitsFileError::Json {
            path: path_ref.to_path_buf(),
            source,
        })?;

    if limits.max_cpus <= 0.0 || limits.max_processes == 0 || limits.max_output_bytes == 0 {
        return Err(LimitsFileError::NonPositive {
            path: path_ref.to_path_buf(),
        });
    }
    Ok(limits)
}
