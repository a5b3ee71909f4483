//! Import job API handlers
//!
//! POST /pipeline/jobs starts a run over an uploaded file and returns
//! immediately; the pipeline executes in a background task and progress is
//! observable via GET /pipeline/jobs/:id and the SSE stream.

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{ImportJob, JobStatus};
use crate::pipeline::tracker::JobTracker;
use crate::pipeline::writer::SqliteAssetWriter;
use crate::pipeline::PhaseOrchestrator;
use crate::AppState;

/// POST /pipeline/jobs request
#[derive(Debug, Deserialize)]
pub struct StartJobRequest {
    pub file_id: Uuid,
    #[serde(default)]
    pub created_by: Option<String>,
}

/// POST /pipeline/jobs response
#[derive(Debug, Serialize)]
pub struct StartJobResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
}

/// GET /pipeline/jobs query
#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<ImportJob>,
}

/// POST /pipeline/jobs
///
/// Freezes the rule/alias stores, creates a PENDING job, and spawns the run.
pub async fn start_job(
    State(state): State<AppState>,
    Json(request): Json<StartJobRequest>,
) -> ApiResult<Json<StartJobResponse>> {
    let file = crate::db::files::get_file(&state.db, request.file_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("file {}", request.file_id)))?;

    let (snapshot, resolver) = crate::pipeline::load_run_context(&state.db).await?;
    let tracker = JobTracker::new(state.db.clone(), state.event_bus.clone());
    let mut job = tracker.create(file.id, request.created_by).await?;

    let token = CancellationToken::new();
    state
        .cancellation_tokens
        .write()
        .await
        .insert(job.id, token.clone());

    let response = StartJobResponse {
        job_id: job.id,
        status: job.status,
        started_at: job.started_at,
    };

    let state_clone = state.clone();
    tokio::spawn(async move {
        let orchestrator = PhaseOrchestrator::new(
            snapshot,
            resolver,
            tracker,
            SqliteAssetWriter::new(state_clone.db.clone()),
            token,
        );

        match orchestrator.run_to_completion(&mut job, &file.content).await {
            Ok(outcome) => {
                if let Err(e) =
                    crate::db::phase_results::save_trail(&state_clone.db, job.id, &outcome.phases)
                        .await
                {
                    tracing::error!(job_id = %job.id, error = %e, "Failed to store phase results");
                }
            }
            Err(e) => {
                *state_clone.last_error.write().await = Some(e.to_string());
            }
        }

        state_clone.cancellation_tokens.write().await.remove(&job.id);
    });

    Ok(Json(response))
}

/// GET /pipeline/jobs
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> ApiResult<Json<JobListResponse>> {
    let jobs = crate::db::jobs::list_jobs(&state.db, query.limit.clamp(1, 500)).await?;
    Ok(Json(JobListResponse { jobs }))
}

/// GET /pipeline/jobs/:id
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ImportJob>> {
    crate::db::jobs::get_job(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("job {}", id)))
}

/// POST /pipeline/jobs/:id/cancel
///
/// Cancellation is observed between phases; the job lands in CANCELLED once
/// the run notices the token.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let job = crate::db::jobs::get_job(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("job {}", id)))?;
    if job.is_terminal() {
        return Err(ApiError::Conflict(format!(
            "job {} already finished with status {}",
            id, job.status
        )));
    }

    let tokens = state.cancellation_tokens.read().await;
    match tokens.get(&id) {
        Some(token) => {
            token.cancel();
            tracing::info!(job_id = %id, "Cancellation requested");
            Ok(Json(serde_json::json!({ "job_id": id, "cancelling": true })))
        }
        None => Err(ApiError::Conflict(format!("job {} is not running", id))),
    }
}

/// GET /pipeline/jobs/:id/phase-results/download
///
/// The full diagnostic trail as a JSON attachment.
pub async fn download_phase_results(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let job = crate::db::jobs::get_job(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("job {}", id)))?;
    let phases = crate::db::phase_results::load_trail(&state.db, id).await?;

    let body = serde_json::to_string_pretty(&serde_json::json!({
        "job_id": job.id,
        "status": job.status,
        "total_rows": job.total_rows,
        "processed_rows": job.processed_rows,
        "error_rows": job.error_rows,
        "phases": phases,
    }))
    .map_err(|e| ApiError::Internal(e.to_string()))?;

    let headers = [
        (header::CONTENT_TYPE, "application/json".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"job-{}-phase-results.json\"", id),
        ),
    ];
    Ok((headers, body).into_response())
}

/// Build job control routes
pub fn job_routes() -> Router<AppState> {
    Router::new()
        .route("/pipeline/jobs", get(list_jobs).post(start_job))
        .route("/pipeline/jobs/:id", get(get_job))
        .route("/pipeline/jobs/:id/cancel", post(cancel_job))
        .route(
            "/pipeline/jobs/:id/phase-results/download",
            get(download_phase_results),
        )
}
