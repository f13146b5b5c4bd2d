use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::errors::FanoutError;
use crate::jobs::{FanoutService, JobRequest, OutputChunk};
use crate::token::Token;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub service: FanoutService,
}

pub type SharedState = Arc<AppState>;

// ── Request payload types ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RunRequest {
    pub access_token: String,
    pub org: String,
    pub patch: String,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunResponse {
    pub token: Token,
}

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unprocessable(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

impl From<FanoutError> for ApiError {
    fn from(err: FanoutError) -> Self {
        let msg = err.to_string();
        match err {
            FanoutError::InvalidJobType { .. } => ApiError::BadRequest(msg),
            FanoutError::NotFound { .. } => ApiError::NotFound(msg),
            FanoutError::ConfigRead { .. } | FanoutError::ConfigParse { .. } => {
                ApiError::Unprocessable(msg)
            }
            FanoutError::RandomSource(_)
            | FanoutError::SpawnFailed { .. }
            | FanoutError::ProcessRuntime(_)
            | FanoutError::BlockingTask(_) => {
                tracing::error!(error = %msg, "request failed");
                ApiError::Internal(msg)
            }
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/patches", get(list_patches))
        .route("/api/runs", post(create_run))
        .route("/api/runs/{token}/output", get(get_output))
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn list_patches(State(state): State<SharedState>) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.service.job_types().await?))
}

async fn create_run(
    State(state): State<SharedState>,
    Json(req): Json<RunRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.access_token.trim().is_empty() {
        return Err(ApiError::BadRequest("access_token is required".into()));
    }
    if req.org.trim().is_empty() {
        return Err(ApiError::BadRequest("org is required".into()));
    }

    let request = JobRequest::new(req.access_token, req.org, req.patch, req.dry_run);
    let token = state.service.run(request).await?;
    Ok((StatusCode::ACCEPTED, Json(RunResponse { token })))
}

async fn get_output(
    State(state): State<SharedState>,
    Path(token): Path<String>,
) -> Result<Json<OutputChunk>, ApiError> {
    Ok(Json(state.service.output(&Token::from(token))?))
}
