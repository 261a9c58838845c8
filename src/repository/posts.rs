use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::Post;
use crate::error::ServiceResult;

const POST_COLUMNS: &str = "id, author_id, community_id, subject, body, image_ref, created_at";

/// Repository for post rows
#[derive(Clone)]
pub struct PostRepository {
    pool: PgPool,
}

impl PostRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        author_id: Uuid,
        community_id: Uuid,
        subject: &str,
        body: &str,
        image_ref: Option<&str>,
    ) -> ServiceResult<Post> {
        let post = sqlx::query_as::<_, Post>(&format!(
            r#"
            INSERT INTO posts (id, author_id, community_id, subject, body, image_ref)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(author_id)
        .bind(community_id)
        .bind(subject)
        .bind(body)
        .bind(image_ref)
        .fetch_one(tx.as_mut())
        .await?;

        Ok(post)
    }

    /// Remove a post and everything hanging off it (comments, votes),
    /// inside the caller's transaction.
    pub async fn delete_with_children(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        post_id: Uuid,
    ) -> ServiceResult<bool> {
        sqlx::query("DELETE FROM comments WHERE post_id = $1")
            .bind(post_id)
            .execute(tx.as_mut())
            .await?;

        sqlx::query("DELETE FROM votes WHERE post_id = $1")
            .bind(post_id)
            .execute(tx.as_mut())
            .await?;

        let affected = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(post_id)
            .execute(tx.as_mut())
            .await?
            .rows_affected();

        Ok(affected > 0)
    }

    pub async fn find_by_id(&self, id: Uuid) -> ServiceResult<Option<Post>> {
        let post =
            sqlx::query_as::<_, Post>(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(post)
    }

    /// Existence probe inside a write transaction. Takes KEY SHARE on the
    /// post row so a concurrent delete (which locks FOR UPDATE) cannot slip
    /// between this check and the caller's dependent insert.
    pub async fn exists(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> ServiceResult<bool> {
        let row: Option<i32> =
            sqlx::query_scalar("SELECT 1 FROM posts WHERE id = $1 FOR KEY SHARE")
                .bind(id)
                .fetch_optional(tx.as_mut())
                .await?;

        Ok(row.is_some())
    }

    /// Lock the post row and return its author, inside the caller's
    /// transaction; `None` when the post is gone.
    pub async fn author_for_update(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> ServiceResult<Option<Uuid>> {
        let author: Option<Uuid> =
            sqlx::query_scalar("SELECT author_id FROM posts WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(tx.as_mut())
                .await?;

        Ok(author)
    }

    pub async fn by_community(&self, community_id: Uuid) -> ServiceResult<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>(&format!(
            r#"
            SELECT {POST_COLUMNS}
            FROM posts
            WHERE community_id = $1
            ORDER BY created_at DESC
            "#
        ))
        .bind(community_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(posts)
    }

    pub async fn by_author(&self, author_id: Uuid) -> ServiceResult<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>(&format!(
            r#"
            SELECT {POST_COLUMNS}
            FROM posts
            WHERE author_id = $1
            ORDER BY created_at DESC
            "#
        ))
        .bind(author_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(posts)
    }

    /// Most recent posts, newest first
    pub async fn recent(&self, limit: i64) -> ServiceResult<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>(&format!(
            r#"
            SELECT {POST_COLUMNS}
            FROM posts
            ORDER BY created_at DESC
            LIMIT $1
            "#
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(posts)
    }
}
