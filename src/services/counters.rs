use sqlx::{PgPool, Postgres, Transaction};

use crate::config::CounterConfig;
use crate::error::ServiceResult;
use crate::repository::CounterStore;

/// Counter facade for in-process collaborators.
///
/// The CRUD services maintain `post:<userId>` and `comments:<postId>` through
/// the transactional entry points; `increment`/`decrement` without a caller
/// transaction wrap the update in their own.
#[derive(Clone)]
pub struct CounterService {
    pool: PgPool,
    store: CounterStore,
}

impl CounterService {
    pub fn new(pool: PgPool, config: &CounterConfig) -> Self {
        Self {
            store: CounterStore::new(pool.clone(), config),
            pool,
        }
    }

    /// The underlying store, for callers composing counter updates into
    /// their own transactions.
    pub fn store(&self) -> &CounterStore {
        &self.store
    }

    /// Add 1 to the counter in a standalone transaction.
    pub async fn increment(&self, key: &str) -> ServiceResult<()> {
        let mut tx = self.pool.begin().await?;
        self.store.increment(&mut tx, key).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Subtract 1 from the counter in a standalone transaction.
    pub async fn decrement(&self, key: &str) -> ServiceResult<()> {
        let mut tx = self.pool.begin().await?;
        self.store.decrement(&mut tx, key).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Add 1 inside the caller's transaction.
    pub async fn increment_in(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        key: &str,
    ) -> ServiceResult<()> {
        self.store.increment(tx, key).await
    }

    /// Subtract 1 inside the caller's transaction.
    pub async fn decrement_in(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        key: &str,
    ) -> ServiceResult<()> {
        self.store.decrement(tx, key).await
    }

    /// Aggregate value of the counter; 0 when never written.
    pub async fn get_count(&self, key: &str) -> ServiceResult<i64> {
        self.store.count(key).await
    }
}
