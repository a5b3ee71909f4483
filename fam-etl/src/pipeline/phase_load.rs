//! LOAD phase: batched persistence and progress accounting
//!
//! Row errors accumulated by the earlier phases are flushed alongside each
//! batch's processed count, so the job's `error_rows <= processed_rows`
//! invariant holds at every observable moment.

use super::types::{PhaseReport, PipelineError};
use super::writer::{AssetUpsert, AssetWriter, LoadPolicy};
use super::{PhaseOrchestrator, RunState};
use crate::models::{ImportJob, Phase, RowError};
use std::collections::HashSet;
use tracing::debug;

impl<W: AssetWriter> PhaseOrchestrator<W> {
    pub(super) async fn run_load(
        &self,
        job: &mut ImportJob,
        state: &mut RunState,
    ) -> Result<PhaseReport, PipelineError> {
        let rows_in = state.rows.len();
        let policy = LoadPolicy::from_rules(self.snapshot.phase_rules(Phase::Load));
        let mut pending = std::mem::take(&mut state.pending_errors);
        let mut load_errors = Vec::new();
        let mut warnings = vec![format!(
            "load policy: conflict={:?} key={} batch={} boundary={:?} rollback={:?}",
            policy.conflict, policy.key_field, policy.batch_size, policy.boundary, policy.rollback
        )];

        // Rows without a key value cannot be persisted
        let mut upserts = Vec::with_capacity(state.rows.len());
        let mut missing_key_errors = Vec::new();
        for row in &state.rows {
            match row.get(&policy.key_field).map(str::trim).filter(|v| !v.is_empty()) {
                Some(key) => upserts.push(AssetUpsert {
                    row_index: row.index,
                    key: key.to_string(),
                    fields: row.values.clone(),
                }),
                None => missing_key_errors.push(RowError::field(
                    row.index,
                    &policy.key_field,
                    "missing key value; row not loaded",
                )),
            }
        }

        let mut written = 0usize;
        let mut skipped = 0usize;
        for batch in upserts.chunks(policy.batch_size.max(1)) {
            if self.cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
            let outcome = self.writer.write_batch(batch, &policy).await?;
            written += outcome.written;
            skipped += outcome.skipped;

            let batch_indices: HashSet<usize> = batch.iter().map(|u| u.row_index).collect();
            let mut batch_errors = drain_for(&mut pending, &batch_indices);
            for (row_index, message) in outcome.failures {
                let e = RowError::row(row_index, message);
                load_errors.push(e.clone());
                batch_errors.push(e);
            }

            let error_rows: HashSet<usize> =
                batch_errors.iter().map(|e| e.row_index).collect();
            let summaries: Vec<String> = batch_errors.iter().map(RowError::summary).collect();
            self.tracker
                .record_progress(job, batch.len(), error_rows.len(), &summaries)
                .await?;
            debug!(
                batch_len = batch.len(),
                written = outcome.written,
                errors = batch_errors.len(),
                "Batch flushed"
            );
        }

        // Rows that never reached a batch (dropped earlier, or missing their
        // key) are accounted for in one final flush
        load_errors.extend(missing_key_errors.iter().cloned());
        let mut leftover: Vec<RowError> = pending.drain(..).collect();
        leftover.extend(missing_key_errors);
        let leftover_rows: HashSet<usize> = leftover.iter().map(|e| e.row_index).collect();
        let remaining = job.total_rows.saturating_sub(job.processed_rows);
        if remaining > 0 || !leftover.is_empty() {
            let summaries: Vec<String> = leftover.iter().map(RowError::summary).collect();
            self.tracker
                .record_progress(job, remaining, leftover_rows.len(), &summaries)
                .await?;
        }

        if skipped > 0 {
            warnings.push(format!("{} rows skipped by conflict policy", skipped));
        }

        Ok(PhaseReport {
            phase: Phase::Load,
            rules_applied: Vec::new(),
            rows_in,
            rows_out: written,
            sample_before: state.rows.first().cloned(),
            sample_after: state.rows.first().cloned(),
            errors: load_errors,
            warnings,
            duration_ms: 0,
        })
    }
}

/// Remove and return the errors belonging to the given rows
fn drain_for(pending: &mut Vec<RowError>, indices: &HashSet<usize>) -> Vec<RowError> {
    let mut drained = Vec::new();
    let mut keep = Vec::with_capacity(pending.len());
    for e in pending.drain(..) {
        if indices.contains(&e.row_index) {
            drained.push(e);
        } else {
            keep.push(e);
        }
    }
    *pending = keep;
    drained
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_partitions_by_row_index() {
        let mut pending = vec![
            RowError::row(0, "a"),
            RowError::row(5, "b"),
            RowError::row(0, "c"),
        ];
        let drained = drain_for(&mut pending, &HashSet::from([0]));
        assert_eq!(drained.len(), 2);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].row_index, 5);
    }
}
