//! Application configuration loaded from environment variables.
//!
//! `AppConfig` is built once at process start with [`AppConfig::from_env`] and then
//! handed to whatever needs it. Nothing in the workspace reads the environment after
//! start-up.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {key} has invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Represents the complete process configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub code_manager_host: String,
    pub code_manager_port: u16,
    /// Global ceiling on simultaneously running sandboxes.
    pub max_number_containers: usize,
    /// Optional JSON file with `ExecutionLimits`.
    pub execution_config_file: Option<PathBuf>,
    /// Optional JSON file replacing the built-in language table.
    pub languages_file: Option<PathBuf>,
    /// Parent directory for per-run scratch workspaces.
    pub sandbox_scratch_root: PathBuf,
    pub docker_bin: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            code_manager_host: "127.0.0.1".into(),
            code_manager_port: 3001,
            max_number_containers: 4,
            execution_config_file: None,
            languages_file: None,
            sandbox_scratch_root: env::temp_dir(),
            docker_bin: "docker".into(),
        }
    }
}

impl AppConfig {
    /// Loads the configuration from `.env` and environment variables.
    ///
    /// Unset variables fall back to [`AppConfig::default`]; set-but-unparseable
    /// values are reported instead of silently replaced.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Ok(Self {
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            code_manager_host: env::var("CODE_MANAGER_HOST")
                .unwrap_or(defaults.code_manager_host),
            code_manager_port: parse_or("CODE_MANAGER_PORT", defaults.code_manager_port)?,
            max_number_containers: parse_or(
                "MAX_NUMBER_CONTAINERS",
                defaults.max_number_containers,
            )?,
            execution_config_file: optional_path("EXECUTION_CONFIG_FILE"),
            languages_file: optional_path("LANGUAGES_FILE"),
            sandbox_scratch_root: optional_path("SANDBOX_SCRATCH_ROOT")
                .unwrap_or(defaults.sandbox_scratch_root),
            docker_bin: env::var("DOCKER_BIN").unwrap_or(defaults.docker_bin),
        })
    }
}

fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        Err(_) => Ok(default),
    }
}

fn optional_path(key: &str) -> Option<PathBuf> {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}
