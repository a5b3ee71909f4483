//! Column alias API handlers
//!
//! GET/POST /pipeline/aliases, DELETE /pipeline/aliases/:id

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::ColumnAlias;
use crate::AppState;

/// POST /pipeline/aliases request
#[derive(Debug, Deserialize)]
pub struct CreateAliasRequest {
    pub asset_field: String,
    pub csv_alias: String,
    pub confidence: f64,
}

#[derive(Debug, Serialize)]
pub struct AliasListResponse {
    pub aliases: Vec<ColumnAlias>,
}

/// POST /pipeline/aliases
///
/// Upsert keyed on `csv_alias`: posting an existing header replaces its
/// mapping.
pub async fn create_alias(
    State(state): State<AppState>,
    Json(request): Json<CreateAliasRequest>,
) -> ApiResult<Json<ColumnAlias>> {
    let alias = ColumnAlias::new(request.asset_field, request.csv_alias, request.confidence);
    alias.validate().map_err(ApiError::BadRequest)?;

    crate::db::aliases::upsert_alias(&state.db, &alias).await?;
    tracing::info!(
        csv_alias = %alias.csv_alias,
        asset_field = %alias.asset_field,
        confidence = alias.confidence,
        "Alias saved"
    );
    Ok(Json(alias))
}

/// GET /pipeline/aliases
pub async fn list_aliases(State(state): State<AppState>) -> ApiResult<Json<AliasListResponse>> {
    let aliases = crate::db::aliases::list_aliases(&state.db).await?;
    Ok(Json(AliasListResponse { aliases }))
}

/// DELETE /pipeline/aliases/:id
pub async fn delete_alias(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    if !crate::db::aliases::delete_alias(&state.db, id).await? {
        return Err(ApiError::NotFound(format!("alias {}", id)));
    }
    Ok(Json(serde_json::json!({ "deleted": id })))
}

/// Build alias management routes
pub fn alias_routes() -> Router<AppState> {
    Router::new()
        .route("/pipeline/aliases", get(list_aliases).post(create_alias))
        .route("/pipeline/aliases/:id", axum::routing::delete(delete_alias))
}
