//! column_aliases table access
//!
//! `csv_alias` is the natural key; saving an alias for an existing header
//! replaces the earlier mapping (latest write wins).

use super::{parse_datetime, parse_uuid};
use crate::models::ColumnAlias;
use sqlx::{Row as SqlxRow, SqlitePool};
use uuid::Uuid;

pub async fn upsert_alias(pool: &SqlitePool, alias: &ColumnAlias) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO column_aliases
            (id, asset_field, csv_alias, confidence, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(csv_alias) DO UPDATE SET
            asset_field = excluded.asset_field,
            confidence = excluded.confidence,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(alias.id.to_string())
    .bind(&alias.asset_field)
    .bind(&alias.csv_alias)
    .bind(alias.confidence)
    .bind(alias.created_at.to_rfc3339())
    .bind(alias.updated_at.to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn list_aliases(pool: &SqlitePool) -> Result<Vec<ColumnAlias>, sqlx::Error> {
    let rows = sqlx::query("SELECT * FROM column_aliases ORDER BY asset_field, csv_alias")
        .fetch_all(pool)
        .await?;
    rows.into_iter().map(alias_from_row).collect()
}

pub async fn delete_alias(pool: &SqlitePool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM column_aliases WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn alias_from_row(row: sqlx::sqlite::SqliteRow) -> Result<ColumnAlias, sqlx::Error> {
    let id: String = row.get("id");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");
    Ok(ColumnAlias {
        id: parse_uuid(&id)?,
        asset_field: row.get("asset_field"),
        csv_alias: row.get("csv_alias"),
        confidence: row.get("confidence"),
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;

    #[tokio::test]
    async fn upsert_replaces_mapping_for_same_header() {
        let pool = init_memory_pool().await.unwrap();
        upsert_alias(
            &pool,
            &ColumnAlias::new("oldField".to_string(), "Asset ID".to_string(), 0.5),
        )
        .await
        .unwrap();
        upsert_alias(
            &pool,
            &ColumnAlias::new("assetTag".to_string(), "Asset ID".to_string(), 1.0),
        )
        .await
        .unwrap();

        let aliases = list_aliases(&pool).await.unwrap();
        assert_eq!(aliases.len(), 1);
        assert_eq!(aliases[0].asset_field, "assetTag");
        assert_eq!(aliases[0].confidence, 1.0);
    }
}
