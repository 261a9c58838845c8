use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::User;
use crate::error::{ServiceError, ServiceResult};

/// Repository for user rows. Users are created on first authenticated
/// interaction and never deleted here.
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Resolve the external identity to a user row, creating it on first
    /// contact. The upsert keys on `external_id`, so concurrent first
    /// requests for the same identity converge on one row. A new identity
    /// claiming an already-taken username is rejected as `DuplicateName`.
    pub async fn get_or_create(&self, external_id: &str, username: &str) -> ServiceResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, external_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (external_id) DO UPDATE
            SET external_id = EXCLUDED.external_id
            RETURNING id, username, external_id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(external_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| {
            if ServiceError::is_unique_violation(&err) {
                ServiceError::DuplicateName(username.to_string())
            } else {
                err.into()
            }
        })?;

        Ok(user)
    }

    pub async fn find_by_external_id(&self, external_id: &str) -> ServiceResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, external_id, created_at FROM users WHERE external_id = $1",
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn find_by_username(&self, username: &str) -> ServiceResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, external_id, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn find_by_id(&self, id: Uuid) -> ServiceResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, external_id, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}
