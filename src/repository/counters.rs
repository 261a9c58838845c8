use rand::Rng;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;

use crate::config::CounterConfig;
use crate::error::ServiceResult;
use crate::keys::key_namespace;

/// Durable sharded counter.
///
/// A logical counter named by a key string is stored as up to N independent
/// rows in `counter_shards`; the logical value is the sum over all shards.
/// Writers touch one randomly chosen shard, so concurrent increments on a hot
/// key rarely contend on the same row. Reads pay for that with a multi-row
/// aggregate.
///
/// Increment/decrement run inside the caller's transaction: a counter update
/// either commits together with the domain mutation it accounts for, or not
/// at all. Shard rows are created lazily on first write and never deleted.
#[derive(Clone)]
pub struct CounterStore {
    pool: PgPool,
    default_shards: u32,
    namespace_shards: HashMap<String, u32>,
}

impl CounterStore {
    pub fn new(pool: PgPool, config: &CounterConfig) -> Self {
        Self {
            pool,
            default_shards: config.default_shards.max(1),
            namespace_shards: config.namespace_shards.clone(),
        }
    }

    /// Shard count for a key; fixed by configuration, keyed on the namespace
    /// prefix so hot namespaces (e.g. votes) can run wider than the default.
    pub fn shards_for(&self, key: &str) -> u32 {
        self.namespace_shards
            .get(key_namespace(key))
            .copied()
            .unwrap_or(self.default_shards)
            .max(1)
    }

    /// Add 1 to the logical counter, inside the caller's transaction.
    pub async fn increment(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        key: &str,
    ) -> ServiceResult<()> {
        self.apply(tx, key, 1).await
    }

    /// Subtract 1 from the logical counter, inside the caller's transaction.
    ///
    /// The shard chosen is independent of the ones previously incremented;
    /// individual shards may go negative as long as the aggregate stays
    /// balanced with the domain rows it accounts for.
    pub async fn decrement(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        key: &str,
    ) -> ServiceResult<()> {
        self.apply(tx, key, -1).await
    }

    /// Sum of all shard values for the key; 0 when no shard row exists yet.
    pub async fn count(&self, key: &str) -> ServiceResult<i64> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(value), 0)::BIGINT
            FROM counter_shards
            WHERE key = $1
            "#,
        )
        .bind(key)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    /// Aggregate two counters in one statement, so both tallies come from
    /// the same snapshot (a polarity switch in flight can never show up in
    /// one key but not the other).
    pub async fn count_pair(&self, key_a: &str, key_b: &str) -> ServiceResult<(i64, i64)> {
        let (a, b): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(value) FILTER (WHERE key = $1), 0)::BIGINT,
                COALESCE(SUM(value) FILTER (WHERE key = $2), 0)::BIGINT
            FROM counter_shards
            WHERE key IN ($1, $2)
            "#,
        )
        .bind(key_a)
        .bind(key_b)
        .fetch_one(&self.pool)
        .await?;

        Ok((a, b))
    }

    async fn apply(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        key: &str,
        delta: i64,
    ) -> ServiceResult<()> {
        let shard_id = pick_shard(self.shards_for(key));

        sqlx::query(
            r#"
            INSERT INTO counter_shards (key, shard_id, value)
            VALUES ($1, $2, $3)
            ON CONFLICT (key, shard_id) DO UPDATE
            SET value = counter_shards.value + EXCLUDED.value
            "#,
        )
        .bind(key)
        .bind(shard_id as i32)
        .bind(delta)
        .execute(tx.as_mut())
        .await?;

        Ok(())
    }
}

/// Uniform random shard selection. Any policy distributing writes across
/// `[0, shards)` preserves correctness; random needs no shared state.
fn pick_shard(shards: u32) -> u32 {
    if shards <= 1 {
        0
    } else {
        rand::thread_rng().gen_range(0..shards)
    }
}
