//! MAP phase: header → asset-field translation plus vocabulary rules
//!
//! Structural mapping happens first: FIELD_MAPPING rule overrides take
//! precedence over the alias snapshot, and unmapped columns are dropped.
//! The remaining MAP kinds (ENUM_MAPPING, REFERENCE_LOOKUP, DEFAULT_VALUE)
//! then run over the renamed rows.

use super::types::PhaseReport;
use super::writer::AssetWriter;
use super::{PhaseOrchestrator, RunState};
use crate::engine;
use crate::models::rule::RuleConfig;
use crate::models::{FieldMappingReport, MappedField, Phase, Row, RuleKind};
use indexmap::IndexMap;
use tracing::debug;

impl<W: AssetWriter> PhaseOrchestrator<W> {
    pub(super) fn run_map(&self, state: &mut RunState) -> PhaseReport {
        let rows_in = state.rows.len();
        let sample_before = state.rows.first().cloned();
        let mut warnings = Vec::new();

        // FIELD_MAPPING overrides, first active rule per header wins
        let mut overrides: IndexMap<String, String> = IndexMap::new();
        for rule in self
            .snapshot
            .phase_rules(Phase::Map)
            .iter()
            .filter(|r| r.kind == RuleKind::FieldMapping)
        {
            if let Ok(RuleConfig::FieldMapping(cfg)) = RuleConfig::parse(rule.kind, &rule.config) {
                overrides.entry(cfg.csv_header).or_insert(cfg.asset_field);
            }
        }

        let mut mapped_fields = Vec::new();
        let mut unmapped_fields = Vec::new();
        let mut translation: Vec<(String, String)> = Vec::new();
        for header in &state.headers {
            let resolved = match overrides.get(header) {
                Some(asset_field) => Some(MappedField {
                    csv_header: header.clone(),
                    asset_field: asset_field.clone(),
                    confidence: 1.0,
                }),
                None => self.resolver.resolve(header).map(|r| MappedField {
                    csv_header: header.clone(),
                    asset_field: r.asset_field.clone(),
                    confidence: r.confidence,
                }),
            };
            match resolved {
                Some(m) => {
                    if translation.iter().any(|(_, f)| f == &m.asset_field) {
                        warnings.push(format!(
                            "multiple columns map to '{}'; the last one wins",
                            m.asset_field
                        ));
                    }
                    translation.push((m.csv_header.clone(), m.asset_field.clone()));
                    mapped_fields.push(m);
                }
                None => unmapped_fields.push(header.clone()),
            }
        }

        let report_data = FieldMappingReport {
            mapped_fields,
            unmapped_fields,
            total_csv_columns: state.headers.len(),
        };
        if !report_data.unmapped_fields.is_empty() {
            warnings.push(format!(
                "{} unmapped columns dropped: {}",
                report_data.unmapped_fields.len(),
                report_data.unmapped_fields.join(", ")
            ));
        }
        warnings.push(format!(
            "alias coverage {}% ({} of {} columns)",
            report_data.coverage_percent(),
            report_data.mapped_fields.len(),
            report_data.total_csv_columns
        ));

        // Rewrite rows in source column order under asset-field names
        for row in &mut state.rows {
            let mut renamed = Row::new(row.index);
            for (csv_header, asset_field) in &translation {
                if let Some(value) = row.get(csv_header) {
                    renamed.set(asset_field, value.to_string());
                }
            }
            *row = renamed;
        }
        state.headers = translation.iter().map(|(_, f)| f.clone()).collect();
        state.headers.dedup();
        debug!(
            coverage = report_data.coverage_percent(),
            mapped = report_data.mapped_fields.len(),
            "Headers mapped to asset fields"
        );
        state.mapping = Some(report_data);

        // Value-level MAP rules over the renamed rows
        let errors_before = state.pending_errors.len();
        let applied = engine::apply_phase_rules(
            Phase::Map,
            self.snapshot.phase_rules(Phase::Map),
            std::mem::take(&mut state.rows),
            &mut state.pending_errors,
        );
        state.rows = applied.rows;
        warnings.extend(applied.warnings);

        PhaseReport {
            phase: Phase::Map,
            rules_applied: applied.rules_applied,
            rows_in,
            rows_out: state.rows.len(),
            sample_before,
            sample_after: state.rows.first().cloned(),
            errors: state.pending_errors[errors_before..].to_vec(),
            warnings,
            duration_ms: 0,
        }
    }
}
