use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::Community;
use crate::error::ServiceResult;

/// Repository for community rows
#[derive(Clone)]
pub struct CommunityRepository {
    pool: PgPool,
}

impl CommunityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a community; `None` when the name is already taken
    /// (`UNIQUE (name)` on the table).
    pub async fn insert(
        &self,
        name: &str,
        description: Option<&str>,
        author_id: Uuid,
    ) -> ServiceResult<Option<Community>> {
        let community = sqlx::query_as::<_, Community>(
            r#"
            INSERT INTO communities (id, name, description, author_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (name) DO NOTHING
            RETURNING id, name, description, author_id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(description)
        .bind(author_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(community)
    }

    pub async fn find_by_name(&self, name: &str) -> ServiceResult<Option<Community>> {
        let community = sqlx::query_as::<_, Community>(
            "SELECT id, name, description, author_id, created_at FROM communities WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(community)
    }

    /// Existence probe inside a write transaction; KEY SHARE keeps the row
    /// alive until the caller's dependent insert commits.
    pub async fn exists(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> ServiceResult<bool> {
        let row: Option<i32> =
            sqlx::query_scalar("SELECT 1 FROM communities WHERE id = $1 FOR KEY SHARE")
                .bind(id)
                .fetch_optional(tx.as_mut())
                .await?;

        Ok(row.is_some())
    }

    pub async fn find_by_id(&self, id: Uuid) -> ServiceResult<Option<Community>> {
        let community = sqlx::query_as::<_, Community>(
            "SELECT id, name, description, author_id, created_at FROM communities WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(community)
    }
}
