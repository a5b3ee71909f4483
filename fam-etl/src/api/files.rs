//! File upload API handlers
//!
//! POST /pipeline/files, GET /pipeline/files/:id
//!
//! Files are stored whole so a job can be re-run against the exact bytes
//! that were uploaded.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::UploadedFile;
use crate::AppState;

/// POST /pipeline/files request
#[derive(Debug, Deserialize)]
pub struct UploadFileRequest {
    pub filename: String,
    /// Raw CSV text
    pub content: String,
}

/// File metadata (content is never echoed back)
#[derive(Debug, Serialize)]
pub struct FileResponse {
    pub id: Uuid,
    pub filename: String,
    pub size_bytes: usize,
    pub uploaded_at: DateTime<Utc>,
}

impl From<&UploadedFile> for FileResponse {
    fn from(file: &UploadedFile) -> Self {
        Self {
            id: file.id,
            filename: file.filename.clone(),
            size_bytes: file.size_bytes,
            uploaded_at: file.uploaded_at,
        }
    }
}

/// POST /pipeline/files
pub async fn upload_file(
    State(state): State<AppState>,
    Json(request): Json<UploadFileRequest>,
) -> ApiResult<Json<FileResponse>> {
    if request.filename.trim().is_empty() {
        return Err(ApiError::BadRequest("filename must not be empty".to_string()));
    }
    let file = UploadedFile::new(request.filename, request.content);
    crate::db::files::save_file(&state.db, &file).await?;
    tracing::info!(
        file_id = %file.id,
        filename = %file.filename,
        size_bytes = file.size_bytes,
        "File uploaded"
    );
    Ok(Json(FileResponse::from(&file)))
}

/// GET /pipeline/files/:id
pub async fn get_file(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<FileResponse>> {
    crate::db::files::get_file(&state.db, id)
        .await?
        .map(|f| Json(FileResponse::from(&f)))
        .ok_or_else(|| ApiError::NotFound(format!("file {}", id)))
}

/// Build file upload routes
pub fn file_routes() -> Router<AppState> {
    Router::new()
        .route("/pipeline/files", post(upload_file))
        .route("/pipeline/files/:id", get(get_file))
}
