//! uploaded_files table access

use super::{parse_datetime, parse_uuid};
use crate::models::UploadedFile;
use sqlx::{Row as SqlxRow, SqlitePool};
use uuid::Uuid;

pub async fn save_file(pool: &SqlitePool, file: &UploadedFile) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO uploaded_files (id, filename, content, size_bytes, uploaded_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(file.id.to_string())
    .bind(&file.filename)
    .bind(&file.content)
    .bind(file.size_bytes as i64)
    .bind(file.uploaded_at.to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_file(pool: &SqlitePool, id: Uuid) -> Result<Option<UploadedFile>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM uploaded_files WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;
    row.map(file_from_row).transpose()
}

fn file_from_row(row: sqlx::sqlite::SqliteRow) -> Result<UploadedFile, sqlx::Error> {
    let id: String = row.get("id");
    let uploaded_at: String = row.get("uploaded_at");
    Ok(UploadedFile {
        id: parse_uuid(&id)?,
        filename: row.get("filename"),
        content: row.get("content"),
        size_bytes: row.get::<i64, _>("size_bytes") as usize,
        uploaded_at: parse_datetime(&uploaded_at)?,
    })
}
