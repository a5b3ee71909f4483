//! Job Tracker
//!
//! Creates and updates the persistent job record for each pipeline run and
//! broadcasts progress events. A detached tracker backs dry runs: same
//! state machine, no persistence, no events.

use crate::models::{ImportJob, JobStatus};
use crate::pipeline::types::PhaseReport;
use chrono::Utc;
use fam_common::events::{EventBus, PipelineEvent};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

#[derive(Clone)]
pub struct JobTracker {
    db: Option<SqlitePool>,
    event_bus: Option<EventBus>,
}

impl JobTracker {
    pub fn new(db: SqlitePool, event_bus: EventBus) -> Self {
        Self {
            db: Some(db),
            event_bus: Some(event_bus),
        }
    }

    /// Tracker for dry runs: counters advance in memory only
    pub fn detached() -> Self {
        Self {
            db: None,
            event_bus: None,
        }
    }

    /// Create a PENDING job for a file
    pub async fn create(
        &self,
        file_id: Uuid,
        created_by: Option<String>,
    ) -> Result<ImportJob, sqlx::Error> {
        let job = ImportJob::new(file_id, created_by);
        self.save(&job).await?;
        self.emit(PipelineEvent::JobCreated {
            job_id: job.id,
            file_id,
            timestamp: Utc::now(),
        });
        info!(job_id = %job.id, file_id = %file_id, "Import job created");
        Ok(job)
    }

    /// PENDING → RUNNING
    pub async fn mark_running(&self, job: &mut ImportJob) -> Result<(), sqlx::Error> {
        job.status = JobStatus::Running;
        self.save(job).await
    }

    /// Record the total row count once EXTRACT has produced the row set
    pub async fn set_total(&self, job: &mut ImportJob, total: usize) -> Result<(), sqlx::Error> {
        job.total_rows = total;
        self.save(job).await?;
        self.emit(PipelineEvent::JobStarted {
            job_id: job.id,
            total_rows: total,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Advance row counters and append errors (monotonic, bounded)
    pub async fn record_progress(
        &self,
        job: &mut ImportJob,
        processed_delta: usize,
        error_delta: usize,
        new_errors: &[String],
    ) -> Result<(), sqlx::Error> {
        job.record_progress(processed_delta, error_delta, new_errors);
        self.save(job).await?;
        self.emit(PipelineEvent::JobProgress {
            job_id: job.id,
            processed_rows: job.processed_rows,
            error_rows: job.error_rows,
            total_rows: job.total_rows,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Broadcast a completed phase's diagnostics
    pub fn phase_completed(&self, job: &ImportJob, report: &PhaseReport) {
        self.emit(PipelineEvent::PhaseCompleted {
            job_id: job.id,
            phase: report.phase.to_string(),
            rows_out: report.rows_out,
            errors: report.errors.len(),
            warnings: report.warnings.len(),
            duration_ms: report.duration_ms,
            timestamp: Utc::now(),
        });
    }

    /// Move the job to a terminal state
    pub async fn finish(
        &self,
        job: &mut ImportJob,
        status: JobStatus,
    ) -> Result<(), sqlx::Error> {
        job.finish(status);
        self.save(job).await?;
        self.emit(PipelineEvent::JobFinished {
            job_id: job.id,
            status: status.to_string(),
            processed_rows: job.processed_rows,
            error_rows: job.error_rows,
            timestamp: Utc::now(),
        });
        info!(
            job_id = %job.id,
            status = %status,
            processed_rows = job.processed_rows,
            error_rows = job.error_rows,
            "Import job finished"
        );
        Ok(())
    }

    async fn save(&self, job: &ImportJob) -> Result<(), sqlx::Error> {
        match &self.db {
            Some(pool) => crate::db::jobs::save_job(pool, job).await,
            None => Ok(()),
        }
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn detached_tracker_runs_state_machine_in_memory() {
        let tracker = JobTracker::detached();
        let mut job = tracker.create(Uuid::new_v4(), None).await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);

        tracker.mark_running(&mut job).await.unwrap();
        tracker.set_total(&mut job, 3).await.unwrap();
        tracker
            .record_progress(&mut job, 3, 1, &["row 1: bad".to_string()])
            .await
            .unwrap();
        tracker.finish(&mut job, JobStatus::Completed).await.unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.processed_rows, 3);
        assert_eq!(job.error_rows, 1);
        assert!(job.error_rows <= job.processed_rows);
        assert!(job.processed_rows <= job.total_rows);
    }
}
