use sqlx::PgPool;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::config::CounterConfig;
use crate::domain::{Comment, CommentWithAuthor};
use crate::error::{ServiceError, ServiceResult};
use crate::keys::comment_count_key;
use crate::repository::{CommentRepository, CounterStore, PostRepository};

use super::posts::DELETED;

/// Comment creation and reads. Creation bumps `comments:<postId>` in the
/// same transaction as the insert.
#[derive(Clone)]
pub struct CommentService {
    pool: PgPool,
    comments: CommentRepository,
    posts: PostRepository,
    counters: CounterStore,
}

impl CommentService {
    pub fn new(pool: PgPool, config: &CounterConfig) -> Self {
        Self {
            comments: CommentRepository::new(pool.clone()),
            posts: PostRepository::new(pool.clone()),
            counters: CounterStore::new(pool.clone(), config),
            pool,
        }
    }

    pub async fn create(
        &self,
        caller: Option<Uuid>,
        post_id: Uuid,
        content: &str,
    ) -> ServiceResult<Comment> {
        let author_id = caller.ok_or(ServiceError::Unauthenticated)?;

        let mut tx = self.pool.begin().await?;

        if !self.posts.exists(&mut tx, post_id).await? {
            return Err(ServiceError::NotFound(format!("post {post_id}")));
        }

        let comment = self
            .comments
            .insert(&mut tx, post_id, author_id, content)
            .await?;
        self.counters
            .increment(&mut tx, &comment_count_key(post_id))
            .await?;

        tx.commit().await?;
        Ok(comment)
    }

    /// Comments on a post, oldest first, with author usernames.
    pub async fn get_comments(&self, post_id: Uuid) -> ServiceResult<Vec<CommentWithAuthor>> {
        let comments = self.comments.by_post(post_id).await?;
        if comments.is_empty() {
            return Ok(Vec::new());
        }

        let author_ids: Vec<Uuid> = comments
            .iter()
            .map(|c| c.author_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let authors: HashMap<Uuid, String> =
            sqlx::query_as::<_, (Uuid, String)>("SELECT id, username FROM users WHERE id = ANY($1)")
                .bind(&author_ids)
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .collect();

        Ok(comments
            .into_iter()
            .map(|comment| {
                let author_username = authors
                    .get(&comment.author_id)
                    .cloned()
                    .unwrap_or_else(|| DELETED.to_string());
                CommentWithAuthor {
                    comment,
                    author_username,
                }
            })
            .collect())
    }

    /// Number of comments on a post (`comments:<postId>` counter).
    pub async fn get_comment_count(&self, post_id: Uuid) -> ServiceResult<i64> {
        self.counters.count(&comment_count_key(post_id)).await
    }
}
