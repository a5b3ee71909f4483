//! VALIDATE phase: structural checks before any value is touched

use super::types::{PhaseReport, PipelineError};
use super::writer::AssetWriter;
use super::{PhaseOrchestrator, RunState};
use crate::engine;
use crate::models::{Phase, RuleKind};

impl<W: AssetWriter> PhaseOrchestrator<W> {
    /// Check required columns, then run row-level validation rules
    ///
    /// A missing required column aborts the run unless a MAP-phase
    /// DEFAULT_VALUE rule covers the column (by its raw name or its resolved
    /// asset field), in which case the gap is downgraded to a warning.
    /// NON_EMPTY failures are row errors; they never abort.
    pub(super) fn run_validate(
        &self,
        state: &mut RunState,
    ) -> Result<PhaseReport, PipelineError> {
        let rules = self.snapshot.phase_rules(Phase::Validate);
        let mut warnings = Vec::new();

        for rule in rules.iter().filter(|r| r.kind == RuleKind::RequiredColumns) {
            for column in engine::validate::missing_required_columns(rule, &state.headers) {
                if self.has_default_fallback(&column) {
                    warnings.push(format!(
                        "required column '{}' is missing but a default value covers it",
                        column
                    ));
                } else {
                    return Err(PipelineError::ValidateAbort(format!(
                        "required column '{}' is missing",
                        column
                    )));
                }
            }
        }

        let errors_before = state.pending_errors.len();
        let applied = engine::apply_phase_rules(
            Phase::Validate,
            rules,
            std::mem::take(&mut state.rows),
            &mut state.pending_errors,
        );
        state.rows = applied.rows;

        let mut report = PhaseReport::identity(Phase::Validate, &state.rows);
        report.rules_applied = applied.rules_applied;
        report.errors = state.pending_errors[errors_before..].to_vec();
        report.warnings = warnings;
        report.warnings.extend(applied.warnings);
        Ok(report)
    }

    /// True when an active MAP DEFAULT_VALUE rule targets the column name or
    /// the asset field it resolves to
    fn has_default_fallback(&self, column: &str) -> bool {
        let resolved = self.resolver.resolve(column).map(|r| r.asset_field.clone());
        self.snapshot
            .phase_rules(Phase::Map)
            .iter()
            .filter(|r| r.kind == RuleKind::DefaultValue)
            .any(|r| {
                r.targets()
                    .iter()
                    .any(|t| t == column || Some(t) == resolved.as_ref())
            })
    }
}
