//! Rule management API handlers
//!
//! POST/GET /pipeline/rules, GET/PATCH/DELETE /pipeline/rules/:id
//!
//! Kind/phase consistency and config shape are enforced here at save time,
//! so every rule the engine ever sees is well-formed.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{Phase, Rule, RuleKind};
use crate::AppState;

/// POST /pipeline/rules request
#[derive(Debug, Deserialize)]
pub struct CreateRuleRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub phase: Phase,
    pub kind: RuleKind,
    /// Comma-separated target column/field names
    #[serde(default)]
    pub target: String,
    #[serde(default = "default_config")]
    pub config: serde_json::Value,
    #[serde(default)]
    pub priority: i64,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_config() -> serde_json::Value {
    serde_json::json!({})
}

fn default_active() -> bool {
    true
}

/// GET /pipeline/rules query
#[derive(Debug, Deserialize)]
pub struct ListRulesQuery {
    pub phase: Option<Phase>,
}

#[derive(Debug, Serialize)]
pub struct RuleListResponse {
    pub rules: Vec<Rule>,
}

/// POST /pipeline/rules
pub async fn create_rule(
    State(state): State<AppState>,
    Json(request): Json<CreateRuleRequest>,
) -> ApiResult<Json<Rule>> {
    let now = Utc::now();
    let rule = Rule {
        id: Uuid::new_v4(),
        name: request.name,
        description: request.description,
        phase: request.phase,
        kind: request.kind,
        target: request.target,
        config: request.config,
        priority: request.priority,
        is_active: request.is_active,
        created_at: now,
        updated_at: now,
    };
    rule.validate().map_err(ApiError::BadRequest)?;

    crate::db::rules::save_rule(&state.db, &rule).await?;
    tracing::info!(rule_id = %rule.id, name = %rule.name, phase = %rule.phase, "Rule created");
    Ok(Json(rule))
}

/// GET /pipeline/rules
pub async fn list_rules(
    State(state): State<AppState>,
    Query(query): Query<ListRulesQuery>,
) -> ApiResult<Json<RuleListResponse>> {
    let rules = crate::db::rules::list_rules(&state.db, query.phase).await?;
    Ok(Json(RuleListResponse { rules }))
}

/// GET /pipeline/rules/:id
pub async fn get_rule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Rule>> {
    crate::db::rules::get_rule(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("rule {}", id)))
}

/// PATCH /pipeline/rules/:id
///
/// Full replacement; the id, creation timestamp, and nothing else survive.
pub async fn update_rule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<CreateRuleRequest>,
) -> ApiResult<Json<Rule>> {
    let existing = crate::db::rules::get_rule(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("rule {}", id)))?;

    let rule = Rule {
        id,
        name: request.name,
        description: request.description,
        phase: request.phase,
        kind: request.kind,
        target: request.target,
        config: request.config,
        priority: request.priority,
        is_active: request.is_active,
        created_at: existing.created_at,
        updated_at: Utc::now(),
    };
    rule.validate().map_err(ApiError::BadRequest)?;

    crate::db::rules::save_rule(&state.db, &rule).await?;
    tracing::info!(rule_id = %rule.id, "Rule updated");
    Ok(Json(rule))
}

/// DELETE /pipeline/rules/:id
pub async fn delete_rule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    if !crate::db::rules::delete_rule(&state.db, id).await? {
        return Err(ApiError::NotFound(format!("rule {}", id)));
    }
    tracing::info!(rule_id = %id, "Rule deleted");
    Ok(Json(serde_json::json!({ "deleted": id })))
}

/// Build rule management routes
pub fn rule_routes() -> Router<AppState> {
    Router::new()
        .route("/pipeline/rules", get(list_rules).post(create_rule))
        .route(
            "/pipeline/rules/:id",
            get(get_rule).patch(update_rule).delete(delete_rule),
        )
}
