//! TRANSFORM phase: value shaping over raw headers

use super::types::PhaseReport;
use super::writer::AssetWriter;
use super::{PhaseOrchestrator, RunState};
use crate::models::Phase;

impl<W: AssetWriter> PhaseOrchestrator<W> {
    pub(super) fn run_transform(&self, state: &mut RunState) -> PhaseReport {
        self.run_engine_phase(Phase::Transform, state)
    }
}
