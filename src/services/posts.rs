use sqlx::PgPool;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::config::CounterConfig;
use crate::domain::{EnrichedPost, Post};
use crate::error::{ServiceError, ServiceResult};
use crate::keys::post_count_key;
use crate::repository::{CommunityRepository, CounterStore, PostRepository, UserRepository};

/// Display fallback for authors/communities that no longer exist
pub(crate) const DELETED: &str = "[deleted]";

/// Post creation, deletion and enriched reads.
///
/// Creation and deletion maintain the author's `post:<userId>` counter in the
/// same transaction as the row mutation.
#[derive(Clone)]
pub struct PostService {
    pool: PgPool,
    posts: PostRepository,
    communities: CommunityRepository,
    users: UserRepository,
    counters: CounterStore,
}

impl PostService {
    pub fn new(pool: PgPool, config: &CounterConfig) -> Self {
        Self {
            posts: PostRepository::new(pool.clone()),
            communities: CommunityRepository::new(pool.clone()),
            users: UserRepository::new(pool.clone()),
            counters: CounterStore::new(pool.clone(), config),
            pool,
        }
    }

    /// Create a post in a community and bump the author's post counter.
    pub async fn create(
        &self,
        caller: Option<Uuid>,
        community_id: Uuid,
        subject: &str,
        body: &str,
        image_ref: Option<&str>,
    ) -> ServiceResult<Post> {
        let author_id = caller.ok_or(ServiceError::Unauthenticated)?;

        let mut tx = self.pool.begin().await?;

        if !self.communities.exists(&mut tx, community_id).await? {
            return Err(ServiceError::NotFound(format!("community {community_id}")));
        }

        let post = self
            .posts
            .insert(&mut tx, author_id, community_id, subject, body, image_ref)
            .await?;
        self.counters
            .increment(&mut tx, &post_count_key(author_id))
            .await?;

        tx.commit().await?;
        Ok(post)
    }

    /// Delete a post with its comments and votes; author only.
    pub async fn delete(&self, caller: Option<Uuid>, post_id: Uuid) -> ServiceResult<()> {
        let user_id = caller.ok_or(ServiceError::Unauthenticated)?;

        let mut tx = self.pool.begin().await?;

        let author_id = self
            .posts
            .author_for_update(&mut tx, post_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("post {post_id}")))?;
        if author_id != user_id {
            return Err(ServiceError::PermissionDenied(
                "only the author can delete a post".to_string(),
            ));
        }

        self.posts.delete_with_children(&mut tx, post_id).await?;
        self.counters
            .decrement(&mut tx, &post_count_key(author_id))
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Single post with display joins; `None` when missing.
    pub async fn get(&self, post_id: Uuid) -> ServiceResult<Option<EnrichedPost>> {
        let Some(post) = self.posts.find_by_id(post_id).await? else {
            return Ok(None);
        };
        let mut enriched = enrich_posts(&self.pool, vec![post]).await?;
        Ok(enriched.pop())
    }

    /// Posts of a community, newest first, with display joins.
    pub async fn by_community(&self, community_id: Uuid) -> ServiceResult<Vec<EnrichedPost>> {
        let posts = self.posts.by_community(community_id).await?;
        enrich_posts(&self.pool, posts).await
    }

    /// Posts authored by a username; empty when the user is unknown.
    pub async fn by_author_username(&self, username: &str) -> ServiceResult<Vec<EnrichedPost>> {
        let Some(user) = self.users.find_by_username(username).await? else {
            return Ok(Vec::new());
        };
        let posts = self.posts.by_author(user.id).await?;
        enrich_posts(&self.pool, posts).await
    }

    /// Number of posts the user has created (`post:<userId>` counter).
    pub async fn get_post_count(&self, user_id: Uuid) -> ServiceResult<i64> {
        self.counters.count(&post_count_key(user_id)).await
    }
}

/// Batched author/community display lookup for a set of posts
pub(crate) async fn display_maps(
    pool: &PgPool,
    posts: &[Post],
) -> ServiceResult<(HashMap<Uuid, String>, HashMap<Uuid, String>)> {
    let author_ids: Vec<Uuid> = posts
        .iter()
        .map(|p| p.author_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let community_ids: Vec<Uuid> = posts
        .iter()
        .map(|p| p.community_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let authors: Vec<(Uuid, String)> =
        sqlx::query_as("SELECT id, username FROM users WHERE id = ANY($1)")
            .bind(&author_ids)
            .fetch_all(pool)
            .await?;
    let communities: Vec<(Uuid, String)> =
        sqlx::query_as("SELECT id, name FROM communities WHERE id = ANY($1)")
            .bind(&community_ids)
            .fetch_all(pool)
            .await?;

    Ok((
        authors.into_iter().collect(),
        communities.into_iter().collect(),
    ))
}

/// Join posts with author/community names, `"[deleted]"` when gone
pub(crate) async fn enrich_posts(
    pool: &PgPool,
    posts: Vec<Post>,
) -> ServiceResult<Vec<EnrichedPost>> {
    if posts.is_empty() {
        return Ok(Vec::new());
    }

    let (authors, communities) = display_maps(pool, &posts).await?;

    Ok(posts
        .into_iter()
        .map(|post| {
            let author_username = authors
                .get(&post.author_id)
                .cloned()
                .unwrap_or_else(|| DELETED.to_string());
            let community_name = communities
                .get(&post.community_id)
                .cloned()
                .unwrap_or_else(|| DELETED.to_string());
            EnrichedPost {
                post,
                author_username,
                community_name,
            }
        })
        .collect())
}
