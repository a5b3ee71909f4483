//! Column alias model
//!
//! An alias maps a raw CSV column header to a canonical asset field with a
//! human-authored confidence score. Aliases are unique per `csv_alias`;
//! creation is an upsert, latest write wins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnAlias {
    pub id: Uuid,
    /// Canonical asset field name (e.g. "assetTag")
    pub asset_field: String,
    /// Raw CSV header, globally unique, matched case-sensitively
    pub csv_alias: String,
    /// Stored confidence in [0, 1]; authored, never computed
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ColumnAlias {
    pub fn new(asset_field: String, csv_alias: String, confidence: f64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            asset_field,
            csv_alias,
            confidence,
            created_at: now,
            updated_at: now,
        }
    }

    /// Bounds check for the stored confidence score
    pub fn validate(&self) -> Result<(), String> {
        if self.csv_alias.is_empty() {
            return Err("csv_alias must not be empty".to_string());
        }
        if self.asset_field.is_empty() {
            return Err("asset_field must not be empty".to_string());
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!(
                "confidence must be within [0, 1], got {}",
                self.confidence
            ));
        }
        Ok(())
    }
}
