//! EXTRACT phase: CSV parsing and structural normalization

use super::source::{self, RawTable};
use super::types::{PhaseReport, PipelineError};
use super::writer::AssetWriter;
use super::{PhaseOrchestrator, RunState};
use crate::models::{ImportJob, Phase, Row};
use tracing::debug;

impl<W: AssetWriter> PhaseOrchestrator<W> {
    /// Parse the file and normalize it into the run's row set
    ///
    /// Headers are trimmed and internal whitespace collapsed; unnamed columns
    /// are dropped, ragged records padded or truncated, and fully blank rows
    /// discarded. A file with no usable data rows aborts the run.
    pub(super) async fn run_extract(
        &self,
        job: &mut ImportJob,
        content: &str,
        state: &mut RunState,
    ) -> Result<PhaseReport, PipelineError> {
        let RawTable { headers, records } =
            source::parse_csv(content).map_err(PipelineError::ExtractAbort)?;
        let records_in = records.len();
        let mut warnings = Vec::new();

        // Normalized header names, with unnamed columns marked for dropping
        let mut keep: Vec<(usize, String)> = Vec::with_capacity(headers.len());
        for (pos, raw) in headers.iter().enumerate() {
            let name = normalize_header(raw);
            if name.is_empty() {
                warnings.push(format!("column {} has no header and was dropped", pos + 1));
            } else {
                keep.push((pos, name));
            }
        }
        if keep.is_empty() {
            return Err(PipelineError::ExtractAbort("no named columns".to_string()));
        }

        let mut ragged = 0usize;
        let mut blank = 0usize;
        let mut rows = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            if record.len() != headers.len() {
                ragged += 1;
            }
            let mut row = Row::new(index);
            for (pos, name) in &keep {
                // Short records pad with empty values, long ones truncate
                let value = record.get(*pos).cloned().unwrap_or_default();
                row.set(name, value);
            }
            if row.values.values().all(|v| v.trim().is_empty()) {
                blank += 1;
                continue;
            }
            rows.push(row);
        }
        if ragged > 0 {
            warnings.push(format!("{} rows had a different column count than the header", ragged));
        }
        if blank > 0 {
            warnings.push(format!("{} blank rows discarded", blank));
        }
        if rows.is_empty() {
            return Err(PipelineError::ExtractAbort(
                "file contains no data rows".to_string(),
            ));
        }

        debug!(
            columns = keep.len(),
            rows = rows.len(),
            ragged,
            blank,
            "Extract normalized the row set"
        );

        state.headers = keep.into_iter().map(|(_, name)| name).collect();
        state.rows = rows;
        self.tracker.set_total(job, state.rows.len()).await?;

        let mut report = PhaseReport::identity(Phase::Extract, &state.rows);
        report.rows_in = records_in;
        report.sample_before = None;
        report.warnings = warnings;
        Ok(report)
    }
}

/// Trim and collapse runs of internal whitespace to single spaces
fn normalize_header(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
