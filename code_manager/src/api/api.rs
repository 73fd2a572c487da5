//api/api.rs
use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};

use crate::error::SandboxError;
use crate::manager::manager::ContainerManager;
use crate::manager::queue::QueueStats;
use crate::types::{ExecutionRequest, ExecutionResult, ExecutionStatus};

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<ContainerManager>,
}

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub language: String,
    pub source_code: String,
    #[serde(default)]
    pub stdin: Option<String>,
    /// Falls back to the language's default.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub memory_limit_mb: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub status: ExecutionStatus,
    #[serde(flatten)]
    pub result: ExecutionResult,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub queue: QueueStats,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub fn router(manager: Arc<ContainerManager>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/languages", get(languages))
        .route("/run", post(run_code))
        .with_state(AppState { manager })
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "code_manager is running",
            queue: state.manager.stats(),
        }),
    )
}

pub async fn languages(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.manager.registry().ids())
}

pub async fn run_code(State(state): State<AppState>, Json(payload): Json<RunRequest>) -> Response {
    tracing::info!(language = %payload.language, bytes = payload.source_code.len(), "received run request");

    let recipe = match state.manager.registry().resolve(&payload.language) {
        Ok(recipe) => recipe,
        Err(e) => return error_response(SandboxError::from(e)),
    };
    let request = ExecutionRequest {
        source_code: payload.source_code,
        language: recipe.id.clone(),
        stdin: payload.stdin.unwrap_or_default(),
        timeout_ms: payload.timeout_ms.unwrap_or(recipe.default_timeout_ms),
        memory_limit_mb: payload.memory_limit_mb.unwrap_or(recipe.default_memory_limit_mb),
    };

    match state.manager.execute(&request).await {
        Ok(result) => (
            StatusCode::OK,
            Json(RunResponse {
                status: result.status(),
                result,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

fn error_response(err: SandboxError) -> Response {
    let status = if err.is_infrastructure() {
        tracing::error!(error = %err, "sandbox run failed");
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::BAD_REQUEST
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}
