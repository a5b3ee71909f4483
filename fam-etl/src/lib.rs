//! fam-etl library interface
//!
//! CSV-to-asset import pipeline for the facility asset manager: rule and
//! alias administration, the phased import orchestrator, and job tracking,
//! all exposed over HTTP REST + SSE.

pub mod api;
pub mod db;
pub mod engine;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod resolver;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use fam_common::events::EventBus;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Cancellation tokens for jobs currently running
    pub cancellation_tokens: Arc<RwLock<HashMap<Uuid, CancellationToken>>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last pipeline abort for diagnostics
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(db: SqlitePool, event_bus: EventBus) -> Self {
        Self {
            db,
            event_bus,
            cancellation_tokens: Arc::new(RwLock::new(HashMap::new())),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::rule_routes())
        .merge(api::alias_routes())
        .merge(api::file_routes())
        .merge(api::job_routes())
        .merge(api::orchestrator_routes())
        .route("/pipeline/events", get(api::pipeline_event_stream))
        .merge(api::health_routes())
        .with_state(state)
}
