//! pipeline_rules table access

use super::{decode_err, parse_datetime, parse_uuid};
use crate::models::{Phase, Rule, RuleKind};
use sqlx::{Row as SqlxRow, SqlitePool};
use uuid::Uuid;

/// Insert or update a rule (latest write wins on id)
pub async fn save_rule(pool: &SqlitePool, rule: &Rule) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO pipeline_rules
            (id, name, description, phase, kind, target, config, priority, is_active,
             created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            description = excluded.description,
            phase = excluded.phase,
            kind = excluded.kind,
            target = excluded.target,
            config = excluded.config,
            priority = excluded.priority,
            is_active = excluded.is_active,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(rule.id.to_string())
    .bind(&rule.name)
    .bind(&rule.description)
    .bind(rule.phase.as_str())
    .bind(rule.kind.as_str())
    .bind(&rule.target)
    .bind(rule.config.to_string())
    .bind(rule.priority)
    .bind(rule.is_active)
    .bind(rule.created_at.to_rfc3339())
    .bind(rule.updated_at.to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_rule(pool: &SqlitePool, id: Uuid) -> Result<Option<Rule>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM pipeline_rules WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;
    row.map(rule_from_row).transpose()
}

/// All rules, optionally restricted to one phase, in execution order
pub async fn list_rules(
    pool: &SqlitePool,
    phase: Option<Phase>,
) -> Result<Vec<Rule>, sqlx::Error> {
    let rows = match phase {
        Some(p) => {
            sqlx::query(
                "SELECT * FROM pipeline_rules WHERE phase = ?
                 ORDER BY priority, created_at, id",
            )
            .bind(p.as_str())
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query("SELECT * FROM pipeline_rules ORDER BY phase, priority, created_at, id")
                .fetch_all(pool)
                .await?
        }
    };
    rows.into_iter().map(rule_from_row).collect()
}

/// Active rules in execution order, read once per run to freeze a snapshot
pub async fn load_active_rules(pool: &SqlitePool) -> Result<Vec<Rule>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT * FROM pipeline_rules WHERE is_active = 1
         ORDER BY priority, created_at, id",
    )
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(rule_from_row).collect()
}

/// Returns true when a row was deleted
pub async fn delete_rule(pool: &SqlitePool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM pipeline_rules WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn rule_from_row(row: sqlx::sqlite::SqliteRow) -> Result<Rule, sqlx::Error> {
    let phase_str: String = row.get("phase");
    let kind_str: String = row.get("kind");
    let config_str: String = row.get("config");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");
    let id: String = row.get("id");

    Ok(Rule {
        id: parse_uuid(&id)?,
        name: row.get("name"),
        description: row.get("description"),
        phase: Phase::parse(&phase_str).ok_or_else(|| {
            sqlx::Error::Decode(format!("unknown phase '{}'", phase_str).into())
        })?,
        kind: RuleKind::parse(&kind_str).ok_or_else(|| {
            sqlx::Error::Decode(format!("unknown rule kind '{}'", kind_str).into())
        })?,
        target: row.get("target"),
        config: serde_json::from_str(&config_str).map_err(decode_err)?,
        priority: row.get("priority"),
        is_active: row.get("is_active"),
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;
    use chrono::Utc;
    use serde_json::json;

    fn sample_rule(name: &str, priority: i64) -> Rule {
        Rule {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: Some("trim manufacturer".to_string()),
            phase: Phase::Clean,
            kind: RuleKind::Trim,
            target: "Manufacturer".to_string(),
            config: json!({"sides": "both"}),
            priority,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn save_and_load_round_trip() {
        let pool = init_memory_pool().await.unwrap();
        let rule = sample_rule("trim", 10);
        save_rule(&pool, &rule).await.unwrap();

        let loaded = get_rule(&pool, rule.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "trim");
        assert_eq!(loaded.phase, Phase::Clean);
        assert_eq!(loaded.kind, RuleKind::Trim);
        assert_eq!(loaded.config, json!({"sides": "both"}));
    }

    #[tokio::test]
    async fn active_rules_come_back_in_execution_order() {
        let pool = init_memory_pool().await.unwrap();
        save_rule(&pool, &sample_rule("second", 20)).await.unwrap();
        save_rule(&pool, &sample_rule("first", 10)).await.unwrap();
        let mut inactive = sample_rule("hidden", 5);
        inactive.is_active = false;
        save_rule(&pool, &inactive).await.unwrap();

        let rules = load_active_rules(&pool).await.unwrap();
        let names: Vec<_> = rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn delete_reports_whether_a_row_existed() {
        let pool = init_memory_pool().await.unwrap();
        let rule = sample_rule("trim", 10);
        save_rule(&pool, &rule).await.unwrap();
        assert!(delete_rule(&pool, rule.id).await.unwrap());
        assert!(!delete_rule(&pool, rule.id).await.unwrap());
    }
}
