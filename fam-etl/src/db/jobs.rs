//! import_jobs table access

use super::{decode_err, parse_datetime, parse_uuid};
use crate::models::job::JobStatus;
use crate::models::ImportJob;
use sqlx::{Row as SqlxRow, SqlitePool};
use uuid::Uuid;

/// Insert or update the full job record
pub async fn save_job(pool: &SqlitePool, job: &ImportJob) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO import_jobs
            (id, file_id, status, total_rows, processed_rows, error_rows, errors,
             started_at, completed_at, created_by)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            status = excluded.status,
            total_rows = excluded.total_rows,
            processed_rows = excluded.processed_rows,
            error_rows = excluded.error_rows,
            errors = excluded.errors,
            completed_at = excluded.completed_at
        "#,
    )
    .bind(job.id.to_string())
    .bind(job.file_id.to_string())
    .bind(job.status.as_str())
    .bind(job.total_rows as i64)
    .bind(job.processed_rows as i64)
    .bind(job.error_rows as i64)
    .bind(serde_json::to_string(&job.errors).map_err(decode_err)?)
    .bind(job.started_at.to_rfc3339())
    .bind(job.completed_at.map(|t| t.to_rfc3339()))
    .bind(&job.created_by)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_job(pool: &SqlitePool, id: Uuid) -> Result<Option<ImportJob>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM import_jobs WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;
    row.map(job_from_row).transpose()
}

/// Most recent jobs first
pub async fn list_jobs(pool: &SqlitePool, limit: i64) -> Result<Vec<ImportJob>, sqlx::Error> {
    let rows = sqlx::query("SELECT * FROM import_jobs ORDER BY started_at DESC LIMIT ?")
        .bind(limit)
        .fetch_all(pool)
        .await?;
    rows.into_iter().map(job_from_row).collect()
}

fn job_status_from_str(s: &str) -> Result<JobStatus, sqlx::Error> {
    match s {
        "PENDING" => Ok(JobStatus::Pending),
        "RUNNING" => Ok(JobStatus::Running),
        "COMPLETED" => Ok(JobStatus::Completed),
        "FAILED" => Ok(JobStatus::Failed),
        "CANCELLED" => Ok(JobStatus::Cancelled),
        other => Err(sqlx::Error::Decode(
            format!("unknown job status '{}'", other).into(),
        )),
    }
}

fn job_from_row(row: sqlx::sqlite::SqliteRow) -> Result<ImportJob, sqlx::Error> {
    let id: String = row.get("id");
    let file_id: String = row.get("file_id");
    let status: String = row.get("status");
    let errors: String = row.get("errors");
    let started_at: String = row.get("started_at");
    let completed_at: Option<String> = row.get("completed_at");

    Ok(ImportJob {
        id: parse_uuid(&id)?,
        file_id: parse_uuid(&file_id)?,
        status: job_status_from_str(&status)?,
        total_rows: row.get::<i64, _>("total_rows") as usize,
        processed_rows: row.get::<i64, _>("processed_rows") as usize,
        error_rows: row.get::<i64, _>("error_rows") as usize,
        errors: serde_json::from_str(&errors).map_err(decode_err)?,
        started_at: parse_datetime(&started_at)?,
        completed_at: completed_at.as_deref().map(parse_datetime).transpose()?,
        created_by: row.get("created_by"),
    })
}
