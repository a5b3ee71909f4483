//! Pipeline data contracts
//!
//! Types flowing between the orchestrator, the phases, and the job tracker.

use crate::models::{FieldMappingReport, Phase, Row, RowError, Rule};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Per-phase diagnostic record, persisted as part of the job's trail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseReport {
    pub phase: Phase,
    /// Names of rules that touched the row set
    pub rules_applied: Vec<String>,
    pub rows_in: usize,
    pub rows_out: usize,
    /// First row before the phase ran, when one exists
    pub sample_before: Option<Row>,
    /// First row after the phase ran
    pub sample_after: Option<Row>,
    /// Row-scoped errors recorded during this phase
    pub errors: Vec<RowError>,
    pub warnings: Vec<String>,
    pub duration_ms: u64,
}

impl PhaseReport {
    pub fn identity(phase: Phase, rows: &[Row]) -> Self {
        Self {
            phase,
            rules_applied: Vec::new(),
            rows_in: rows.len(),
            rows_out: rows.len(),
            sample_before: rows.first().cloned(),
            sample_after: rows.first().cloned(),
            errors: Vec::new(),
            warnings: Vec::new(),
            duration_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub phases_completed: usize,
    pub total_duration_ms: u64,
}

/// Full result of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutcome {
    pub phases: Vec<PhaseReport>,
    pub summary: RunSummary,
    /// Alias coverage computed during MAP
    pub mapping: Option<FieldMappingReport>,
    pub final_rows: Vec<Row>,
}

/// Unrecoverable run failures; row-level errors never surface here
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The file produced no usable rows
    #[error("Extract phase aborted: {0}")]
    ExtractAbort(String),

    /// A required column is missing with no fallback
    #[error("Validate phase aborted: {0}")]
    ValidateAbort(String),

    /// Cancellation hook fired between phases
    #[error("Pipeline cancelled")]
    Cancelled,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Active rules frozen at run start, ordered for execution
///
/// Concurrent rule edits never affect a run in progress; each run reads the
/// store exactly once.
#[derive(Debug, Clone, Default)]
pub struct RuleSnapshot {
    by_phase: HashMap<Phase, Vec<Rule>>,
}

impl RuleSnapshot {
    /// Freeze a rule list: inactive rules dropped, each phase sorted by
    /// ascending priority with insertion order breaking ties
    pub fn from_rules(rules: Vec<Rule>) -> Self {
        let mut by_phase: HashMap<Phase, Vec<Rule>> = HashMap::new();
        for rule in rules.into_iter().filter(|r| r.is_active) {
            by_phase.entry(rule.phase).or_default().push(rule);
        }
        for phase_rules in by_phase.values_mut() {
            // Stable sort keeps insertion order on equal priorities
            phase_rules.sort_by_key(|r| r.priority);
        }
        Self { by_phase }
    }

    pub fn phase_rules(&self, phase: Phase) -> &[Rule] {
        self.by_phase.get(&phase).map_or(&[], |v| v.as_slice())
    }

    pub fn rule_count(&self) -> usize {
        self.by_phase.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RuleKind;
    use chrono::Utc;
    use uuid::Uuid;

    fn rule(name: &str, priority: i64, active: bool) -> Rule {
        Rule {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            phase: Phase::Clean,
            kind: RuleKind::Trim,
            target: "x".to_string(),
            config: serde_json::json!({}),
            priority,
            is_active: active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn snapshot_orders_by_priority_with_stable_ties() {
        let snapshot = RuleSnapshot::from_rules(vec![
            rule("b", 20, true),
            rule("a", 10, true),
            rule("tie-first", 15, true),
            rule("tie-second", 15, true),
            rule("inactive", 5, false),
        ]);
        let names: Vec<_> = snapshot
            .phase_rules(Phase::Clean)
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "tie-first", "tie-second", "b"]);
    }

    #[test]
    fn empty_phase_yields_empty_slice() {
        let snapshot = RuleSnapshot::from_rules(vec![]);
        assert!(snapshot.phase_rules(Phase::Load).is_empty());
    }
}
