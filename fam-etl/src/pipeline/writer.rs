//! LOAD phase asset writer
//!
//! The orchestrator hands the writer batches of mapped rows together with a
//! load policy distilled from the active LOAD rules. The trait seam lets dry
//! runs swap in a writer that touches nothing.

use crate::models::rule::{
    BatchSizeConfig, ConflictPolicy, ConflictResolutionConfig, RollbackMode,
    RollbackStrategyConfig, RuleConfig, TransactionBoundaryConfig, TxBoundary,
};
use crate::models::{Rule, RuleKind};
use async_trait::async_trait;
use indexmap::IndexMap;
use sqlx::{Connection, SqlitePool};
use tracing::warn;

/// One row ready for the asset store, keyed by the conflict-resolution field
#[derive(Debug, Clone)]
pub struct AssetUpsert {
    /// Zero-based data-row index in the source file
    pub row_index: usize,
    /// Value of the policy's key field
    pub key: String,
    pub fields: IndexMap<String, String>,
}

/// Write behavior distilled from the active LOAD rules
#[derive(Debug, Clone)]
pub struct LoadPolicy {
    pub conflict: ConflictPolicy,
    pub key_field: String,
    pub batch_size: usize,
    pub boundary: TxBoundary,
    pub rollback: RollbackMode,
}

impl Default for LoadPolicy {
    fn default() -> Self {
        Self {
            conflict: ConflictPolicy::Overwrite,
            key_field: "assetTag".to_string(),
            batch_size: 100,
            boundary: TxBoundary::Batch,
            rollback: RollbackMode::RollbackBatch,
        }
    }
}

impl LoadPolicy {
    /// Distill a policy from LOAD rules; the first active rule of each kind
    /// (priority order) wins, defaults fill the rest
    pub fn from_rules(rules: &[Rule]) -> Self {
        let mut policy = Self::default();
        let mut have_conflict = false;
        let mut have_batch = false;
        let mut have_boundary = false;
        let mut have_rollback = false;

        for rule in rules.iter().filter(|r| r.is_active) {
            match (rule.kind, RuleConfig::parse(rule.kind, &rule.config)) {
                (RuleKind::ConflictResolution, Ok(RuleConfig::ConflictResolution(cfg)))
                    if !have_conflict =>
                {
                    let ConflictResolutionConfig { policy: p, key_field } = cfg;
                    policy.conflict = p;
                    policy.key_field = key_field;
                    have_conflict = true;
                }
                (RuleKind::BatchSize, Ok(RuleConfig::BatchSize(BatchSizeConfig { size })))
                    if !have_batch =>
                {
                    policy.batch_size = size;
                    have_batch = true;
                }
                (
                    RuleKind::TransactionBoundary,
                    Ok(RuleConfig::TransactionBoundary(TransactionBoundaryConfig { boundary })),
                ) if !have_boundary => {
                    policy.boundary = boundary;
                    have_boundary = true;
                }
                (
                    RuleKind::RollbackStrategy,
                    Ok(RuleConfig::RollbackStrategy(RollbackStrategyConfig { strategy })),
                ) if !have_rollback => {
                    policy.rollback = strategy;
                    have_rollback = true;
                }
                (_, Err(msg)) => {
                    warn!(rule = %rule.name, error = %msg, "Ignoring LOAD rule with invalid config");
                }
                _ => {}
            }
        }
        policy
    }
}

/// Outcome of writing one batch
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub written: usize,
    /// Rows skipped by the SKIP conflict policy (not errors)
    pub skipped: usize,
    /// (row_index, message) for rows that failed to persist
    pub failures: Vec<(usize, String)>,
}

#[async_trait]
pub trait AssetWriter: Send + Sync {
    async fn write_batch(
        &self,
        batch: &[AssetUpsert],
        policy: &LoadPolicy,
    ) -> Result<BatchOutcome, sqlx::Error>;
}

/// Production writer backed by the assets table
pub struct SqliteAssetWriter {
    db: SqlitePool,
}

impl SqliteAssetWriter {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AssetWriter for SqliteAssetWriter {
    async fn write_batch(
        &self,
        batch: &[AssetUpsert],
        policy: &LoadPolicy,
    ) -> Result<BatchOutcome, sqlx::Error> {
        let mut outcome = BatchOutcome::default();
        match policy.boundary {
            TxBoundary::Row => {
                let mut conn = self.db.acquire().await?;
                for upsert in batch {
                    match crate::db::assets::upsert_one(&mut conn, upsert, policy.conflict).await {
                        Ok(true) => outcome.written += 1,
                        Ok(false) => outcome.skipped += 1,
                        Err(e) => outcome.failures.push((upsert.row_index, e.to_string())),
                    }
                }
            }
            TxBoundary::Batch => {
                let mut conn = self.db.acquire().await?;
                let mut tx = conn.begin().await?;
                let mut failed: Option<sqlx::Error> = None;
                let mut written = 0;
                let mut skipped = 0;
                for upsert in batch {
                    match crate::db::assets::upsert_one(&mut tx, upsert, policy.conflict).await {
                        Ok(true) => written += 1,
                        Ok(false) => skipped += 1,
                        Err(e) => {
                            failed = Some(e);
                            break;
                        }
                    }
                }
                match failed {
                    None => {
                        tx.commit().await?;
                        outcome.written = written;
                        outcome.skipped = skipped;
                    }
                    Some(e) => {
                        tx.rollback().await?;
                        match policy.rollback {
                            RollbackMode::RollbackBatch => {
                                // Whole batch fails together
                                warn!(error = %e, batch_len = batch.len(), "Batch rolled back");
                                for upsert in batch {
                                    outcome.failures.push((
                                        upsert.row_index,
                                        format!("batch rolled back: {}", e),
                                    ));
                                }
                            }
                            RollbackMode::LogAndSkip => {
                                // Retry rows one at a time so only the bad
                                // ones are lost
                                warn!(error = %e, "Batch failed, retrying rows individually");
                                for upsert in batch {
                                    match crate::db::assets::upsert_one(
                                        &mut conn,
                                        upsert,
                                        policy.conflict,
                                    )
                                    .await
                                    {
                                        Ok(true) => outcome.written += 1,
                                        Ok(false) => outcome.skipped += 1,
                                        Err(e) => outcome
                                            .failures
                                            .push((upsert.row_index, e.to_string())),
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
        Ok(outcome)
    }
}

/// Dry-run writer: counts everything as written, persists nothing
pub struct NoopAssetWriter;

#[async_trait]
impl AssetWriter for NoopAssetWriter {
    async fn write_batch(
        &self,
        batch: &[AssetUpsert],
        _policy: &LoadPolicy,
    ) -> Result<BatchOutcome, sqlx::Error> {
        Ok(BatchOutcome {
            written: batch.len(),
            skipped: 0,
            failures: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Phase;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn load_rule(kind: RuleKind, config: serde_json::Value, priority: i64) -> Rule {
        Rule {
            id: Uuid::new_v4(),
            name: format!("{:?}", kind),
            description: None,
            phase: Phase::Load,
            kind,
            target: "assetTag".to_string(),
            config,
            priority,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn policy_defaults_without_rules() {
        let policy = LoadPolicy::from_rules(&[]);
        assert_eq!(policy.conflict, ConflictPolicy::Overwrite);
        assert_eq!(policy.key_field, "assetTag");
        assert_eq!(policy.batch_size, 100);
    }

    #[test]
    fn first_rule_of_each_kind_wins() {
        let rules = vec![
            load_rule(
                RuleKind::ConflictResolution,
                json!({"policy": "SKIP", "key_field": "serialNumber"}),
                10,
            ),
            load_rule(RuleKind::ConflictResolution, json!({"policy": "MERGE"}), 20),
            load_rule(RuleKind::BatchSize, json!({"size": 25}), 10),
        ];
        let policy = LoadPolicy::from_rules(&rules);
        assert_eq!(policy.conflict, ConflictPolicy::Skip);
        assert_eq!(policy.key_field, "serialNumber");
        assert_eq!(policy.batch_size, 25);
        assert_eq!(policy.boundary, TxBoundary::Batch);
    }

    /// In-memory pool whose assets table rejects one specific key, so tests
    /// can force a mid-batch persistence failure
    async fn failing_pool() -> SqlitePool {
        let pool = crate::db::init_memory_pool().await.unwrap();
        sqlx::query(
            r#"
            CREATE TRIGGER reject_flagged_assets
            BEFORE INSERT ON assets
            WHEN NEW.asset_key = 'REJECT-ME'
            BEGIN
                SELECT RAISE(ABORT, 'asset rejected');
            END
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();
        pool
    }

    fn upsert(row_index: usize, key: &str) -> AssetUpsert {
        AssetUpsert {
            row_index,
            key: key.to_string(),
            fields: IndexMap::from([("assetTag".to_string(), key.to_string())]),
        }
    }

    fn mixed_batch() -> Vec<AssetUpsert> {
        vec![upsert(0, "A-1"), upsert(1, "REJECT-ME"), upsert(2, "A-2")]
    }

    #[tokio::test]
    async fn rollback_batch_fails_the_whole_batch() {
        let pool = failing_pool().await;
        let writer = SqliteAssetWriter::new(pool.clone());
        // Defaults: batch boundary, rollback-batch
        let outcome = writer
            .write_batch(&mixed_batch(), &LoadPolicy::default())
            .await
            .unwrap();

        assert_eq!(outcome.written, 0);
        assert_eq!(outcome.failures.len(), 3);
        assert!(outcome.failures.iter().any(|(i, _)| *i == 1));
        assert_eq!(crate::db::assets::count_assets(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn log_and_skip_retries_rows_and_loses_only_the_bad_one() {
        let pool = failing_pool().await;
        let writer = SqliteAssetWriter::new(pool.clone());
        let policy = LoadPolicy {
            rollback: RollbackMode::LogAndSkip,
            ..LoadPolicy::default()
        };
        let outcome = writer.write_batch(&mixed_batch(), &policy).await.unwrap();

        assert_eq!(outcome.written, 2);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].0, 1);
        assert_eq!(crate::db::assets::count_assets(&pool).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn row_boundary_writes_rows_independently_around_a_failure() {
        let pool = failing_pool().await;
        let writer = SqliteAssetWriter::new(pool.clone());
        let policy = LoadPolicy {
            boundary: TxBoundary::Row,
            ..LoadPolicy::default()
        };
        let outcome = writer.write_batch(&mixed_batch(), &policy).await.unwrap();

        assert_eq!(outcome.written, 2);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].0, 1);
        assert_eq!(crate::db::assets::count_assets(&pool).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn noop_writer_reports_everything_written() {
        let batch = vec![AssetUpsert {
            row_index: 0,
            key: "A-1".to_string(),
            fields: IndexMap::new(),
        }];
        let outcome = NoopAssetWriter
            .write_batch(&batch, &LoadPolicy::default())
            .await
            .unwrap();
        assert_eq!(outcome.written, 1);
        assert!(outcome.failures.is_empty());
    }
}
