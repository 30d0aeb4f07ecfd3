use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;

use crate::jobs::JobManagerError;
use crate::models::StartJobRequest;
use crate::AppState;

/// POST /api/v1/jobs/:tenant
///
/// Starts a job for the tenant. 409 if one is already running, 400 if the
/// use case/sector/country selection produces no queries at all, 503 if the
/// process is already at its concurrent-job ceiling.
pub async fn create_job(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
    Json(request): Json<StartJobRequest>,
) -> impl IntoResponse {
    tracing::info!(tenant = %tenant, use_case = %request.use_case, "starting job");

    match state.job_manager.start(&tenant, request).await {
        Ok(session_id) => (
            StatusCode::ACCEPTED,
            Json(json!({ "session_id": session_id, "status": "running" })),
        ),
        Err(JobManagerError::JobAlreadyRunning) => (
            StatusCode::CONFLICT,
            Json(json!({ "error": "job_already_running" })),
        ),
        Err(JobManagerError::NoQueries) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "no_queries" })),
        ),
        Err(JobManagerError::UnknownUseCase(use_case)) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "unknown_use_case", "use_case": use_case })),
        ),
        Err(JobManagerError::TooManyActiveJobs) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "too_many_active_jobs" })),
        ),
    }
}

/// POST /api/v1/jobs/:tenant/stop
///
/// Requests cancellation of the tenant's running job. Idempotent: stopping
/// a tenant with no active job is not an error.
pub async fn stop_job(State(state): State<AppState>, Path(tenant): Path<String>) -> impl IntoResponse {
    tracing::info!(tenant = %tenant, "stop request");
    state.job_manager.stop(&tenant).await;
    (StatusCode::OK, Json(json!({ "status": "stopping" })))
}

/// GET /api/v1/jobs/:tenant/status
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
) -> impl IntoResponse {
    match state.job_manager.status(&tenant).await {
        Some(status) => (StatusCode::OK, Json(json!(status))),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "no_job_for_tenant" })),
        ),
    }
}

/// GET /api/v1/jobs/:tenant/progress
pub async fn get_job_progress(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
) -> impl IntoResponse {
    match state.job_manager.progress(&tenant).await {
        Some(snapshot) => (StatusCode::OK, Json(json!(snapshot))),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "no_job_for_tenant" })),
        ),
    }
}

/// GET /api/v1/health
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
