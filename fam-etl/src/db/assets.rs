//! assets table access
//!
//! Assets are keyed by the load policy's key field value (`asset_key`);
//! the mapped fields live in a JSON column so the pipeline never needs a
//! schema change when a new alias is introduced.

use super::decode_err;
use crate::models::rule::ConflictPolicy;
use crate::pipeline::writer::AssetUpsert;
use chrono::Utc;
use indexmap::IndexMap;
use sqlx::{Row as SqlxRow, SqliteConnection, SqlitePool};
use uuid::Uuid;

/// Write one mapped row under the given conflict policy
///
/// Returns `true` when the asset was written and `false` when an existing
/// asset was kept by the SKIP policy.
pub async fn upsert_one(
    conn: &mut SqliteConnection,
    upsert: &AssetUpsert,
    conflict: ConflictPolicy,
) -> Result<bool, sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    match conflict {
        ConflictPolicy::Overwrite => {
            let fields = serde_json::to_string(&upsert.fields).map_err(decode_err)?;
            sqlx::query(
                r#"
                INSERT INTO assets (id, asset_key, fields, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(asset_key) DO UPDATE SET
                    fields = excluded.fields,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&upsert.key)
            .bind(fields)
            .bind(&now)
            .bind(&now)
            .execute(conn)
            .await?;
            Ok(true)
        }
        ConflictPolicy::Skip => {
            let fields = serde_json::to_string(&upsert.fields).map_err(decode_err)?;
            let result = sqlx::query(
                r#"
                INSERT INTO assets (id, asset_key, fields, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(asset_key) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&upsert.key)
            .bind(fields)
            .bind(&now)
            .bind(&now)
            .execute(conn)
            .await?;
            Ok(result.rows_affected() > 0)
        }
        ConflictPolicy::Merge => {
            let existing = sqlx::query("SELECT fields FROM assets WHERE asset_key = ?")
                .bind(&upsert.key)
                .fetch_optional(&mut *conn)
                .await?;
            match existing {
                None => {
                    let fields = serde_json::to_string(&upsert.fields).map_err(decode_err)?;
                    sqlx::query(
                        r#"
                        INSERT INTO assets (id, asset_key, fields, created_at, updated_at)
                        VALUES (?, ?, ?, ?, ?)
                        "#,
                    )
                    .bind(Uuid::new_v4().to_string())
                    .bind(&upsert.key)
                    .bind(fields)
                    .bind(&now)
                    .bind(&now)
                    .execute(conn)
                    .await?;
                }
                Some(row) => {
                    let stored: String = row.get("fields");
                    let mut merged: IndexMap<String, String> =
                        serde_json::from_str(&stored).map_err(decode_err)?;
                    // Existing non-blank values win; the incoming row only
                    // fills gaps
                    for (field, value) in &upsert.fields {
                        let keep = merged.get(field).map_or(false, |v| !v.trim().is_empty());
                        if !keep {
                            merged.insert(field.clone(), value.clone());
                        }
                    }
                    let fields = serde_json::to_string(&merged).map_err(decode_err)?;
                    sqlx::query(
                        "UPDATE assets SET fields = ?, updated_at = ? WHERE asset_key = ?",
                    )
                    .bind(fields)
                    .bind(&now)
                    .bind(&upsert.key)
                    .execute(conn)
                    .await?;
                }
            }
            Ok(true)
        }
    }
}

pub async fn count_assets(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    let row = sqlx::query("SELECT COUNT(*) AS n FROM assets")
        .fetch_one(pool)
        .await?;
    Ok(row.get("n"))
}

/// Fields of one asset, for tests and diagnostics
pub async fn get_asset_fields(
    pool: &SqlitePool,
    asset_key: &str,
) -> Result<Option<IndexMap<String, String>>, sqlx::Error> {
    let row = sqlx::query("SELECT fields FROM assets WHERE asset_key = ?")
        .bind(asset_key)
        .fetch_optional(pool)
        .await?;
    match row {
        Some(row) => {
            let fields: String = row.get("fields");
            Ok(Some(serde_json::from_str(&fields).map_err(decode_err)?))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;

    fn upsert(key: &str, pairs: &[(&str, &str)]) -> AssetUpsert {
        AssetUpsert {
            row_index: 0,
            key: key.to_string(),
            fields: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[tokio::test]
    async fn overwrite_replaces_fields() {
        let pool = init_memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        upsert_one(
            &mut conn,
            &upsert("A-1", &[("status", "old")]),
            ConflictPolicy::Overwrite,
        )
        .await
        .unwrap();
        upsert_one(
            &mut conn,
            &upsert("A-1", &[("status", "new")]),
            ConflictPolicy::Overwrite,
        )
        .await
        .unwrap();
        drop(conn);

        let fields = get_asset_fields(&pool, "A-1").await.unwrap().unwrap();
        assert_eq!(fields.get("status").map(String::as_str), Some("new"));
        assert_eq!(count_assets(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn skip_keeps_the_existing_asset() {
        let pool = init_memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let first = upsert_one(
            &mut conn,
            &upsert("A-1", &[("status", "old")]),
            ConflictPolicy::Skip,
        )
        .await
        .unwrap();
        let second = upsert_one(
            &mut conn,
            &upsert("A-1", &[("status", "new")]),
            ConflictPolicy::Skip,
        )
        .await
        .unwrap();
        drop(conn);

        assert!(first);
        assert!(!second);
        let fields = get_asset_fields(&pool, "A-1").await.unwrap().unwrap();
        assert_eq!(fields.get("status").map(String::as_str), Some("old"));
    }

    #[tokio::test]
    async fn merge_fills_gaps_without_clobbering() {
        let pool = init_memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        upsert_one(
            &mut conn,
            &upsert("A-1", &[("status", "In Service"), ("location", "")]),
            ConflictPolicy::Merge,
        )
        .await
        .unwrap();
        upsert_one(
            &mut conn,
            &upsert("A-1", &[("status", "Retired"), ("location", "HQ")]),
            ConflictPolicy::Merge,
        )
        .await
        .unwrap();
        drop(conn);

        let fields = get_asset_fields(&pool, "A-1").await.unwrap().unwrap();
        assert_eq!(fields.get("status").map(String::as_str), Some("In Service"));
        assert_eq!(fields.get("location").map(String::as_str), Some("HQ"));
    }
}
