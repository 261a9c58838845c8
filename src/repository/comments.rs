use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::Comment;
use crate::error::ServiceResult;

/// Repository for comment rows. Comments are insert-only.
#[derive(Clone)]
pub struct CommentRepository {
    pool: PgPool,
}

impl CommentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        post_id: Uuid,
        author_id: Uuid,
        content: &str,
    ) -> ServiceResult<Comment> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO comments (id, post_id, author_id, content)
            VALUES ($1, $2, $3, $4)
            RETURNING id, post_id, author_id, content, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(post_id)
        .bind(author_id)
        .bind(content)
        .fetch_one(tx.as_mut())
        .await?;

        Ok(comment)
    }

    pub async fn by_post(&self, post_id: Uuid) -> ServiceResult<Vec<Comment>> {
        let comments = sqlx::query_as::<_, Comment>(
            r#"
            SELECT id, post_id, author_id, content, created_at
            FROM comments
            WHERE post_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(comments)
    }
}
