//! Row and row-error data contracts
//!
//! Rows flow between phases as ordered column-name → value maps. Row-level
//! failures are threaded through the run as an accumulator rather than
//! exceptions, so one bad value never unwinds the pipeline.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One spreadsheet row, ordered by column position
///
/// `index` is the 0-based data-row index from the source file and stays
/// stable across phases even when rows are dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Row {
    pub index: usize,
    pub values: IndexMap<String, String>,
}

impl Row {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            values: IndexMap::new(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(|s| s.as_str())
    }

    pub fn set(&mut self, field: &str, value: String) {
        self.values.insert(field.to_string(), value);
    }

    /// True when the field is absent or blank after trimming
    pub fn is_blank(&self, field: &str) -> bool {
        self.get(field).map_or(true, |v| v.trim().is_empty())
    }
}

/// Row-scoped failure, attributed to a field when one is known
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowError {
    pub row_index: usize,
    pub field: Option<String>,
    pub message: String,
}

impl RowError {
    pub fn field(row_index: usize, field: &str, message: impl Into<String>) -> Self {
        Self {
            row_index,
            field: Some(field.to_string()),
            message: message.into(),
        }
    }

    pub fn row(row_index: usize, message: impl Into<String>) -> Self {
        Self {
            row_index,
            field: None,
            message: message.into(),
        }
    }

    /// One-line rendering for the job's bounded error list
    pub fn summary(&self) -> String {
        match &self.field {
            Some(f) => format!("row {}: [{}] {}", self.row_index, f, self.message),
            None => format!("row {}: {}", self.row_index, self.message),
        }
    }
}

/// One resolved header in the aggregate mapping report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappedField {
    pub csv_header: String,
    pub asset_field: String,
    pub confidence: f64,
}

/// Aggregate alias-resolution result for a file's header set
///
/// Coverage is a run-quality signal, not a gate; a run proceeds with
/// unmapped fields, which are dropped from the loaded asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMappingReport {
    pub mapped_fields: Vec<MappedField>,
    pub unmapped_fields: Vec<String>,
    pub total_csv_columns: usize,
}

impl FieldMappingReport {
    /// mapped / total, rounded to the nearest integer percent
    pub fn coverage_percent(&self) -> u32 {
        if self.total_csv_columns == 0 {
            return 0;
        }
        ((self.mapped_fields.len() as f64 / self.total_csv_columns as f64) * 100.0).round() as u32
    }
}
