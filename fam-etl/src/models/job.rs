//! Import job state machine
//!
//! A job tracks one pipeline run over one uploaded file. Status progresses
//! PENDING → RUNNING → {COMPLETED, FAILED, CANCELLED}; terminal states never
//! transition again (a retry is a new job referencing the same file). Row
//! counters and the error list accumulate monotonically during a run. Row
//! errors alone never fail a job; COMPLETED-with-errors is a normal outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bounded error list in the job record; the phase-results trail keeps all
pub const MAX_RECORDED_ERRORS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportJob {
    pub id: Uuid,
    pub file_id: Uuid,
    pub status: JobStatus,
    pub total_rows: usize,
    pub processed_rows: usize,
    pub error_rows: usize,
    /// Bounded to MAX_RECORDED_ERRORS entries
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
}

impl ImportJob {
    pub fn new(file_id: Uuid, created_by: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_id,
            status: JobStatus::Pending,
            total_rows: 0,
            processed_rows: 0,
            error_rows: 0,
            errors: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
            created_by,
        }
    }

    /// Advance counters and append errors, keeping the list bounded
    ///
    /// Counters only grow; `processed_rows` is capped at `total_rows`.
    pub fn record_progress(
        &mut self,
        processed_delta: usize,
        error_delta: usize,
        new_errors: &[String],
    ) {
        self.processed_rows = (self.processed_rows + processed_delta).min(self.total_rows);
        self.error_rows = (self.error_rows + error_delta).min(self.processed_rows);
        for e in new_errors {
            if self.errors.len() >= MAX_RECORDED_ERRORS {
                break;
            }
            self.errors.push(e.clone());
        }
    }

    /// Move to a terminal state, setting the completion timestamp
    pub fn finish(&mut self, status: JobStatus) {
        debug_assert!(matches!(
            status,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        ));
        self.status = status;
        self.completed_at = Some(Utc::now());
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_stay_monotonic_and_bounded() {
        let mut job = ImportJob::new(Uuid::new_v4(), None);
        job.total_rows = 10;

        job.record_progress(4, 1, &["row 2: bad value".to_string()]);
        assert_eq!(job.processed_rows, 4);
        assert_eq!(job.error_rows, 1);

        // Deltas past total are capped
        job.record_progress(20, 0, &[]);
        assert_eq!(job.processed_rows, 10);
        assert!(job.error_rows <= job.processed_rows);
    }

    #[test]
    fn error_list_is_bounded() {
        let mut job = ImportJob::new(Uuid::new_v4(), None);
        job.total_rows = 1000;
        let errors: Vec<String> = (0..250).map(|i| format!("row {}: oops", i)).collect();
        job.record_progress(1000, 250, &errors);
        assert_eq!(job.errors.len(), MAX_RECORDED_ERRORS);
        assert_eq!(job.error_rows, 250);
    }

    #[test]
    fn finish_sets_terminal_state() {
        let mut job = ImportJob::new(Uuid::new_v4(), None);
        assert!(!job.is_terminal());
        job.finish(JobStatus::Completed);
        assert!(job.is_terminal());
        assert!(job.completed_at.is_some());
    }
}
