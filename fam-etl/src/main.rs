//! fam-etl - CSV import pipeline microservice
//!
//! Ingests facility asset spreadsheets through a phased ETL pipeline
//! (EXTRACT → VALIDATE → CLEAN → TRANSFORM → MAP → LOAD) driven by
//! admin-authored rules and column aliases. Integrates with the rest of the
//! suite via HTTP REST + SSE.

use anyhow::Result;
use fam_common::config::ServiceConfig;
use fam_common::events::EventBus;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use fam_etl::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting fam-etl (import pipeline) microservice");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = ServiceConfig::load(std::path::Path::new("fam.toml"))?;
    info!("Database: {}", config.database_path.display());

    let db_pool = fam_etl::db::init_database_pool(&config.database_path).await?;
    info!("Database connection established");

    let event_bus = EventBus::new(100); // 100 event capacity
    let state = AppState::new(db_pool, event_bus);
    let app = fam_etl::build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    info!("Listening on http://{}", config.bind_address());
    info!("Health check: http://{}/health", config.bind_address());

    axum::serve(listener, app).await?;

    Ok(())
}
