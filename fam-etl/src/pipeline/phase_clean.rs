//! CLEAN phase: value normalization over raw headers

use super::types::PhaseReport;
use super::writer::AssetWriter;
use super::{PhaseOrchestrator, RunState};
use crate::engine;
use crate::models::Phase;

impl<W: AssetWriter> PhaseOrchestrator<W> {
    pub(super) fn run_clean(&self, state: &mut RunState) -> PhaseReport {
        self.run_engine_phase(Phase::Clean, state)
    }

    /// Shared body for the pure rule-application phases
    pub(super) fn run_engine_phase(&self, phase: Phase, state: &mut RunState) -> PhaseReport {
        let rows_in = state.rows.len();
        let sample_before = state.rows.first().cloned();
        let errors_before = state.pending_errors.len();

        let applied = engine::apply_phase_rules(
            phase,
            self.snapshot.phase_rules(phase),
            std::mem::take(&mut state.rows),
            &mut state.pending_errors,
        );
        state.rows = applied.rows;

        PhaseReport {
            phase,
            rules_applied: applied.rules_applied,
            rows_in,
            rows_out: state.rows.len(),
            sample_before,
            sample_after: state.rows.first().cloned(),
            errors: state.pending_errors[errors_before..].to_vec(),
            warnings: applied.warnings,
            duration_ms: 0,
        }
    }
}
