//! phase_results table access
//!
//! Each completed run leaves a JSON trail of per-phase reports, replacing
//! any trail from an earlier attempt of the same job id.

use super::{decode_err, parse_uuid};
use crate::pipeline::types::PhaseReport;
use chrono::Utc;
use sqlx::{Row as SqlxRow, SqlitePool};
use uuid::Uuid;

pub async fn save_trail(
    pool: &SqlitePool,
    job_id: Uuid,
    phases: &[PhaseReport],
) -> Result<(), sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    sqlx::query("DELETE FROM phase_results WHERE job_id = ?")
        .bind(job_id.to_string())
        .execute(pool)
        .await?;
    for (position, report) in phases.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO phase_results (job_id, position, phase, report, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(job_id.to_string())
        .bind(position as i64)
        .bind(report.phase.as_str())
        .bind(serde_json::to_string(report).map_err(decode_err)?)
        .bind(&now)
        .execute(pool)
        .await?;
    }
    Ok(())
}

/// The trail in phase order; empty when the job never ran or aborted early
pub async fn load_trail(pool: &SqlitePool, job_id: Uuid) -> Result<Vec<PhaseReport>, sqlx::Error> {
    let rows = sqlx::query("SELECT report FROM phase_results WHERE job_id = ? ORDER BY position")
        .bind(job_id.to_string())
        .fetch_all(pool)
        .await?;
    rows.into_iter()
        .map(|row| {
            let report: String = row.get("report");
            serde_json::from_str(&report).map_err(decode_err)
        })
        .collect()
}

/// Job ids that have a stored trail (for diagnostics)
pub async fn jobs_with_trails(pool: &SqlitePool) -> Result<Vec<Uuid>, sqlx::Error> {
    let rows = sqlx::query("SELECT DISTINCT job_id FROM phase_results")
        .fetch_all(pool)
        .await?;
    rows.into_iter()
        .map(|row| {
            let id: String = row.get("job_id");
            parse_uuid(&id)
        })
        .collect()
}
