//! Dry-run and mapping-preview API handlers
//!
//! POST /pipeline/test-orchestrator runs the full phase sequence with a
//! detached tracker and a no-op writer: identical code path, no persistence.
//! GET /pipeline/field-mappings previews alias resolution for an uploaded
//! file without running anything.

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{FieldMappingReport, ImportJob, JobStatus};
use crate::pipeline::source;
use crate::pipeline::types::PhaseReport;
use crate::pipeline::{PhaseOrchestrator, DRY_RUN_FIXTURE_CSV};
use crate::AppState;

/// POST /pipeline/test-orchestrator request
#[derive(Debug, Default, Deserialize)]
pub struct TestOrchestratorRequest {
    /// CSV text to run; the built-in fixture is used when omitted
    #[serde(default)]
    pub csv_content: Option<String>,
}

/// POST /pipeline/test-orchestrator response
#[derive(Debug, Serialize)]
pub struct TestOrchestratorResponse {
    pub status: JobStatus,
    pub total_rows: usize,
    pub processed_rows: usize,
    pub error_rows: usize,
    pub errors: Vec<String>,
    /// Set when the run aborted before completing the sequence
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
    pub phases: Vec<PhaseReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapping: Option<FieldMappingReport>,
}

/// POST /pipeline/test-orchestrator
pub async fn test_orchestrator(
    State(state): State<AppState>,
    request: Option<Json<TestOrchestratorRequest>>,
) -> ApiResult<Json<TestOrchestratorResponse>> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let content = request
        .csv_content
        .as_deref()
        .unwrap_or(DRY_RUN_FIXTURE_CSV);

    let (snapshot, resolver) = crate::pipeline::load_run_context(&state.db).await?;
    let orchestrator = PhaseOrchestrator::dry_run(snapshot, resolver);
    let mut job = ImportJob::new(Uuid::new_v4(), Some("dry-run".to_string()));

    let response = match orchestrator.run_to_completion(&mut job, content).await {
        Ok(outcome) => TestOrchestratorResponse {
            status: job.status,
            total_rows: job.total_rows,
            processed_rows: job.processed_rows,
            error_rows: job.error_rows,
            errors: job.errors,
            aborted: None,
            phases: outcome.phases,
            mapping: outcome.mapping,
        },
        Err(e) => TestOrchestratorResponse {
            status: job.status,
            total_rows: job.total_rows,
            processed_rows: job.processed_rows,
            error_rows: job.error_rows,
            errors: job.errors,
            aborted: Some(e.to_string()),
            phases: Vec::new(),
            mapping: None,
        },
    };
    Ok(Json(response))
}

/// GET /pipeline/field-mappings query
#[derive(Debug, Deserialize)]
pub struct FieldMappingsQuery {
    /// Uploaded file to preview
    pub file: Uuid,
}

/// GET /pipeline/field-mappings response
#[derive(Debug, Serialize)]
pub struct FieldMappingsResponse {
    pub file_id: Uuid,
    pub coverage_percent: u32,
    #[serde(flatten)]
    pub report: FieldMappingReport,
}

/// GET /pipeline/field-mappings?file=<uuid>
pub async fn field_mappings(
    State(state): State<AppState>,
    Query(query): Query<FieldMappingsQuery>,
) -> ApiResult<Json<FieldMappingsResponse>> {
    let file = crate::db::files::get_file(&state.db, query.file)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("file {}", query.file)))?;

    let table = source::parse_csv(&file.content).map_err(ApiError::BadRequest)?;
    let aliases = crate::db::aliases::list_aliases(&state.db).await?;
    let resolver = crate::resolver::AliasResolver::from_aliases(&aliases);
    let report = resolver.resolve_headers(&table.headers);

    Ok(Json(FieldMappingsResponse {
        file_id: file.id,
        coverage_percent: report.coverage_percent(),
        report,
    }))
}

/// Build dry-run and preview routes
pub fn orchestrator_routes() -> Router<AppState> {
    Router::new()
        .route("/pipeline/test-orchestrator", post(test_orchestrator))
        .route("/pipeline/field-mappings", get(field_mappings))
}
