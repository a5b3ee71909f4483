//! Alias Resolver
//!
//! Pure lookup over a snapshot of the column_aliases table. Matching is
//! exact and case-sensitive; there is deliberately no fuzzy fallback, an
//! unmapped header is a normal, reportable outcome for a human or a
//! FIELD_MAPPING rule to resolve explicitly.

use crate::models::{ColumnAlias, FieldMappingReport, MappedField};
use std::collections::HashMap;

/// A single resolved header
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub asset_field: String,
    pub confidence: f64,
}

/// Snapshot-backed resolver, taken once per run
#[derive(Debug, Clone, Default)]
pub struct AliasResolver {
    by_alias: HashMap<String, Resolution>,
}

impl AliasResolver {
    /// Build from an alias snapshot; later duplicates win, matching the
    /// store's latest-write-wins upsert semantics
    pub fn from_aliases(aliases: &[ColumnAlias]) -> Self {
        let mut by_alias = HashMap::with_capacity(aliases.len());
        for alias in aliases {
            by_alias.insert(
                alias.csv_alias.clone(),
                Resolution {
                    asset_field: alias.asset_field.clone(),
                    confidence: alias.confidence,
                },
            );
        }
        Self { by_alias }
    }

    /// Resolve one raw CSV header; None means unmapped, not an error
    pub fn resolve(&self, csv_header: &str) -> Option<&Resolution> {
        self.by_alias.get(csv_header)
    }

    /// Aggregate resolution over a full header set
    pub fn resolve_headers(&self, headers: &[String]) -> FieldMappingReport {
        let mut mapped_fields = Vec::new();
        let mut unmapped_fields = Vec::new();

        for header in headers {
            match self.resolve(header) {
                Some(res) => mapped_fields.push(MappedField {
                    csv_header: header.clone(),
                    asset_field: res.asset_field.clone(),
                    confidence: res.confidence,
                }),
                None => unmapped_fields.push(header.clone()),
            }
        }

        FieldMappingReport {
            mapped_fields,
            unmapped_fields,
            total_csv_columns: headers.len(),
        }
    }
}
