//! # FAM Common Library
//!
//! Shared code for FAM (Facility Asset Manager) services including:
//! - Error types
//! - Event types (PipelineEvent enum) and EventBus
//! - Configuration loading

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
