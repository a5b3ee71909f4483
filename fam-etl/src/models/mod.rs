//! Domain models for the ETL pipeline service

pub mod alias;
pub mod file;
pub mod job;
pub mod row;
pub mod rule;

pub use alias::ColumnAlias;
pub use file::UploadedFile;
pub use job::{ImportJob, JobStatus};
pub use row::{FieldMappingReport, MappedField, Row, RowError};
pub use rule::{Phase, Rule, RuleConfig, RuleKind};
