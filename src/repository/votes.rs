use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::{Polarity, Vote};
use crate::error::ServiceResult;

/// Repository for vote rows.
///
/// A single table holds both directions, tagged by `polarity`; the
/// `UNIQUE (post_id, user_id)` constraint backs the invariant that a user is
/// unvoted, upvoted or downvoted on a post, never more than one of these.
#[derive(Clone)]
pub struct VoteRepository {
    pool: PgPool,
}

impl VoteRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The caller's active vote on a post, any direction, inside the
    /// transaction deciding the toggle transition.
    pub async fn find_by_post_and_user(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        post_id: Uuid,
        user_id: Uuid,
    ) -> ServiceResult<Option<Vote>> {
        let vote = sqlx::query_as::<_, Vote>(
            r#"
            SELECT id, post_id, user_id, polarity, created_at
            FROM votes
            WHERE post_id = $1 AND user_id = $2
            "#,
        )
        .bind(post_id)
        .bind(user_id)
        .fetch_optional(tx.as_mut())
        .await?;

        Ok(vote)
    }

    pub async fn insert(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        post_id: Uuid,
        user_id: Uuid,
        polarity: Polarity,
    ) -> ServiceResult<Vote> {
        let vote = sqlx::query_as::<_, Vote>(
            r#"
            INSERT INTO votes (id, post_id, user_id, polarity)
            VALUES ($1, $2, $3, $4)
            RETURNING id, post_id, user_id, polarity, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(post_id)
        .bind(user_id)
        .bind(polarity)
        .fetch_one(tx.as_mut())
        .await?;

        Ok(vote)
    }

    /// Returns true if a row was removed.
    pub async fn delete(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        vote_id: Uuid,
    ) -> ServiceResult<bool> {
        let affected = sqlx::query("DELETE FROM votes WHERE id = $1")
            .bind(vote_id)
            .execute(tx.as_mut())
            .await?
            .rows_affected();

        Ok(affected > 0)
    }

    /// Whether an exact `(post, user, polarity)` vote exists. Plain read,
    /// no transaction.
    pub async fn exists(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        polarity: Polarity,
    ) -> ServiceResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM votes
                WHERE post_id = $1 AND user_id = $2 AND polarity = $3
            )
            "#,
        )
        .bind(post_id)
        .bind(user_id)
        .bind(polarity)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}
