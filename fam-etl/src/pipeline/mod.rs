//! Phase Orchestrator
//!
//! Drives one pipeline run through the fixed phase sequence
//! EXTRACT → VALIDATE → CLEAN → TRANSFORM → MAP → LOAD. Each phase consumes
//! the previous phase's row set and produces a diagnostic report; row-level
//! failures accumulate without stopping the run, while EXTRACT and VALIDATE
//! aborts fail the whole job. Phase logic lives in the phase_* modules as
//! impl blocks on the orchestrator.

pub mod source;
pub mod tracker;
pub mod types;
pub mod writer;

mod phase_clean;
mod phase_extract;
mod phase_load;
mod phase_map;
mod phase_transform;
mod phase_validate;

use crate::models::{ImportJob, JobStatus, Phase, Row, RowError};
use crate::resolver::AliasResolver;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use tracker::JobTracker;
use types::{PhaseReport, PipelineError, PipelineOutcome, RuleSnapshot, RunSummary};
use writer::{AssetWriter, NoopAssetWriter};

/// Single-row fixture used by the dry-run endpoint when no file is supplied
pub const DRY_RUN_FIXTURE_CSV: &str = "\
Asset ID,Manufacturer,Status,Location
TEST-0001, carrier ,In Service,HQ / Floor 2
";

/// Mutable state threaded through the phase sequence
struct RunState {
    headers: Vec<String>,
    rows: Vec<Row>,
    /// Row errors accumulated since the last progress flush
    pending_errors: Vec<RowError>,
    mapping: Option<crate::models::FieldMappingReport>,
}

pub struct PhaseOrchestrator<W: AssetWriter> {
    snapshot: RuleSnapshot,
    resolver: AliasResolver,
    tracker: JobTracker,
    writer: W,
    cancel: CancellationToken,
}

impl<W: AssetWriter> PhaseOrchestrator<W> {
    pub fn new(
        snapshot: RuleSnapshot,
        resolver: AliasResolver,
        tracker: JobTracker,
        writer: W,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            snapshot,
            resolver,
            tracker,
            writer,
            cancel,
        }
    }

    /// Run the full phase sequence over one file's content
    ///
    /// Returns the run's diagnostic trail on success. An `Err` means the run
    /// aborted (empty file, missing required column, cancellation, storage
    /// failure); row-level errors never surface here.
    pub async fn execute(
        &self,
        job: &mut ImportJob,
        content: &str,
    ) -> Result<PipelineOutcome, PipelineError> {
        let run_started = Instant::now();
        self.tracker.mark_running(job).await?;
        info!(job_id = %job.id, rules = self.snapshot.rule_count(), "Pipeline run starting");

        let mut state = RunState {
            headers: Vec::new(),
            rows: Vec::new(),
            pending_errors: Vec::new(),
            mapping: None,
        };
        let mut phases: Vec<PhaseReport> = Vec::new();

        for phase in Phase::SEQUENCE {
            if self.cancel.is_cancelled() {
                info!(job_id = %job.id, phase = %phase, "Pipeline cancelled between phases");
                return Err(PipelineError::Cancelled);
            }

            let phase_started = Instant::now();
            let mut report = match phase {
                Phase::Extract => self.run_extract(job, content, &mut state).await?,
                Phase::Validate => self.run_validate(&mut state)?,
                Phase::Clean => self.run_clean(&mut state),
                Phase::Transform => self.run_transform(&mut state),
                Phase::Map => self.run_map(&mut state),
                Phase::Load => self.run_load(job, &mut state).await?,
            };
            report.duration_ms = phase_started.elapsed().as_millis() as u64;

            info!(
                job_id = %job.id,
                phase = %phase,
                rows_in = report.rows_in,
                rows_out = report.rows_out,
                errors = report.errors.len(),
                warnings = report.warnings.len(),
                duration_ms = report.duration_ms,
                "Phase completed"
            );
            self.tracker.phase_completed(job, &report);
            phases.push(report);
        }

        Ok(PipelineOutcome {
            summary: RunSummary {
                phases_completed: phases.len(),
                total_duration_ms: run_started.elapsed().as_millis() as u64,
            },
            phases,
            mapping: state.mapping,
            final_rows: state.rows,
        })
    }

    /// Drive `execute` to a terminal job status
    ///
    /// Aborts become FAILED (or CANCELLED); a finished run is COMPLETED even
    /// when row errors were recorded along the way.
    pub async fn run_to_completion(
        &self,
        job: &mut ImportJob,
        content: &str,
    ) -> Result<PipelineOutcome, PipelineError> {
        match self.execute(job, content).await {
            Ok(outcome) => {
                self.tracker.finish(job, JobStatus::Completed).await?;
                Ok(outcome)
            }
            Err(PipelineError::Cancelled) => {
                self.tracker.finish(job, JobStatus::Cancelled).await?;
                Err(PipelineError::Cancelled)
            }
            Err(e) => {
                error!(job_id = %job.id, error = %e, "Pipeline run aborted");
                job.errors.push(e.to_string());
                self.tracker.finish(job, JobStatus::Failed).await?;
                Err(e)
            }
        }
    }
}

/// Freeze the rule and alias stores for a run
///
/// Read exactly once per job; edits made while the run is in flight never
/// affect it.
pub async fn load_run_context(
    pool: &sqlx::SqlitePool,
) -> Result<(RuleSnapshot, AliasResolver), sqlx::Error> {
    let rules = crate::db::rules::load_active_rules(pool).await?;
    let aliases = crate::db::aliases::list_aliases(pool).await?;
    Ok((
        RuleSnapshot::from_rules(rules),
        AliasResolver::from_aliases(&aliases),
    ))
}

impl PhaseOrchestrator<NoopAssetWriter> {
    /// Orchestrator for dry runs: detached tracker, no-op writer
    pub fn dry_run(snapshot: RuleSnapshot, resolver: AliasResolver) -> Self {
        Self::new(
            snapshot,
            resolver,
            JobTracker::detached(),
            NoopAssetWriter,
            CancellationToken::new(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ColumnAlias, Rule, RuleKind};
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn rule(kind: RuleKind, target: &str, config: serde_json::Value, priority: i64) -> Rule {
        Rule {
            id: Uuid::new_v4(),
            name: format!("{:?}@{}", kind, priority),
            description: None,
            phase: kind.phase(),
            kind,
            target: target.to_string(),
            config,
            priority,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn resolver() -> AliasResolver {
        AliasResolver::from_aliases(&[
            ColumnAlias::new("assetTag".to_string(), "Asset ID".to_string(), 1.0),
            ColumnAlias::new("manufacturer".to_string(), "Manufacturer".to_string(), 0.95),
            ColumnAlias::new("status".to_string(), "Status".to_string(), 0.9),
            ColumnAlias::new("location".to_string(), "Location".to_string(), 0.9),
        ])
    }

    fn dry_orchestrator(rules: Vec<Rule>) -> PhaseOrchestrator<NoopAssetWriter> {
        PhaseOrchestrator::dry_run(RuleSnapshot::from_rules(rules), resolver())
    }

    #[tokio::test]
    async fn full_sequence_runs_over_the_fixture() {
        let orch = dry_orchestrator(vec![
            rule(RuleKind::Trim, "Manufacturer", json!({}), 10),
            rule(
                RuleKind::RegexReplace,
                "Manufacturer",
                json!({"pattern": r"(?i)\bcarrier\b", "replacement": "Carrier"}),
                20,
            ),
        ]);
        let mut job = ImportJob::new(Uuid::new_v4(), None);
        let outcome = orch
            .run_to_completion(&mut job, DRY_RUN_FIXTURE_CSV)
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(outcome.phases.len(), Phase::SEQUENCE.len());
        assert_eq!(job.total_rows, 1);
        assert_eq!(job.processed_rows, 1);
        assert_eq!(job.error_rows, 0);

        // Cleaned and mapped: raw header is gone, value normalized
        let first = &outcome.final_rows[0];
        assert_eq!(first.get("manufacturer"), Some("Carrier"));
        assert_eq!(first.get("assetTag"), Some("TEST-0001"));

        let mapping = outcome.mapping.unwrap();
        assert_eq!(mapping.coverage_percent(), 100);
    }

    #[tokio::test]
    async fn empty_file_fails_the_job() {
        let orch = dry_orchestrator(vec![]);
        let mut job = ImportJob::new(Uuid::new_v4(), None);
        let err = orch.run_to_completion(&mut job, "").await.unwrap_err();
        assert!(matches!(err, PipelineError::ExtractAbort(_)));
        assert_eq!(job.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn missing_required_column_aborts_validate() {
        let orch = dry_orchestrator(vec![rule(
            RuleKind::RequiredColumns,
            "Asset ID, Serial Number",
            json!({}),
            10,
        )]);
        let mut job = ImportJob::new(Uuid::new_v4(), None);
        let err = orch
            .run_to_completion(&mut job, DRY_RUN_FIXTURE_CSV)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ValidateAbort(_)));
        assert_eq!(job.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn row_errors_complete_the_job_with_errors() {
        let orch = dry_orchestrator(vec![rule(
            RuleKind::DateFormat,
            "Status",
            json!({"to_format": "%Y-%m-%d"}),
            10,
        )]);
        let mut job = ImportJob::new(Uuid::new_v4(), None);
        let outcome = orch
            .run_to_completion(&mut job, DRY_RUN_FIXTURE_CSV)
            .await
            .unwrap();

        // The fixture row's status is not a date; the job still completes
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.error_rows, 1);
        assert!(job.error_rows <= job.processed_rows);
        assert!(!job.errors.is_empty());
        assert_eq!(outcome.summary.phases_completed, Phase::SEQUENCE.len());
    }

    #[tokio::test]
    async fn blank_required_values_record_errors_but_complete() {
        let orch = dry_orchestrator(vec![rule(
            RuleKind::NonEmpty,
            "Manufacturer",
            json!({}),
            10,
        )]);
        let mut job = ImportJob::new(Uuid::new_v4(), None);
        let content = "Asset ID,Manufacturer\nA-1,\nA-2,Trane\n";
        orch.run_to_completion(&mut job, content).await.unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.total_rows, 2);
        assert_eq!(job.processed_rows, 2);
        assert_eq!(job.error_rows, 1);
    }

    #[tokio::test]
    async fn cancellation_between_phases_stops_the_run() {
        let token = CancellationToken::new();
        let orch = PhaseOrchestrator::new(
            RuleSnapshot::from_rules(vec![]),
            resolver(),
            JobTracker::detached(),
            NoopAssetWriter,
            token.clone(),
        );
        token.cancel();
        let mut job = ImportJob::new(Uuid::new_v4(), None);
        let err = orch
            .run_to_completion(&mut job, DRY_RUN_FIXTURE_CSV)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
        assert_eq!(job.status, JobStatus::Cancelled);
    }

    #[tokio::test]
    async fn unmapped_columns_are_dropped_from_final_rows() {
        let orch = PhaseOrchestrator::dry_run(
            RuleSnapshot::from_rules(vec![]),
            AliasResolver::from_aliases(&[ColumnAlias::new(
                "assetTag".to_string(),
                "Asset ID".to_string(),
                1.0,
            )]),
        );
        let mut job = ImportJob::new(Uuid::new_v4(), None);
        let outcome = orch
            .run_to_completion(&mut job, DRY_RUN_FIXTURE_CSV)
            .await
            .unwrap();

        let first = &outcome.final_rows[0];
        assert_eq!(first.get("assetTag"), Some("TEST-0001"));
        assert!(first.get("Manufacturer").is_none());
        assert!(first.get("manufacturer").is_none());
        let mapping = outcome.mapping.unwrap();
        assert_eq!(mapping.unmapped_fields.len(), 3);
    }
}
