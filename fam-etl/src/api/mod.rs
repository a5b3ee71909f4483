//! HTTP API handlers for fam-etl
//!
//! All pipeline administration goes through this surface: rule and alias
//! management, file upload, job control, and the dry-run endpoint.

pub mod aliases;
pub mod files;
pub mod health;
pub mod jobs;
pub mod orchestrator;
pub mod rules;
pub mod sse;

pub use aliases::alias_routes;
pub use files::file_routes;
pub use health::health_routes;
pub use jobs::job_routes;
pub use orchestrator::orchestrator_routes;
pub use rules::rule_routes;
pub use sse::pipeline_event_stream;
