use sqlx::PgPool;
use uuid::Uuid;

use crate::config::CounterConfig;
use crate::domain::{Polarity, ScoredPost};
use crate::error::ServiceResult;
use crate::keys::vote_key;
use crate::repository::{CounterStore, PostRepository};

use super::posts::{display_maps, DELETED};

const DEFAULT_LIMIT: i64 = 10;

/// Window of recent posts considered for the leaderboard. Scoring reads two
/// counters per post, so the candidate set is capped instead of scanning the
/// whole table.
const CANDIDATE_WINDOW: i64 = 500;

/// Top posts by vote score (upvotes - downvotes), pull-based.
#[derive(Clone)]
pub struct LeaderboardService {
    pool: PgPool,
    posts: PostRepository,
    counters: CounterStore,
}

impl LeaderboardService {
    pub fn new(pool: PgPool, config: &CounterConfig) -> Self {
        Self {
            posts: PostRepository::new(pool.clone()),
            counters: CounterStore::new(pool.clone(), config),
            pool,
        }
    }

    /// The `limit` highest-scoring recent posts, ties broken by recency.
    /// Authors/communities that no longer exist render as `"[deleted]"`.
    pub async fn get_top_posts(&self, limit: Option<i64>) -> ServiceResult<Vec<ScoredPost>> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT).max(0);

        let posts = self.posts.recent(CANDIDATE_WINDOW).await?;
        if posts.is_empty() {
            return Ok(Vec::new());
        }

        let (authors, communities) = display_maps(&self.pool, &posts).await?;

        let mut scored = Vec::with_capacity(posts.len());
        for post in posts {
            let (upvotes, downvotes) = self.tallies(post.id).await?;
            let author_username = authors
                .get(&post.author_id)
                .cloned()
                .unwrap_or_else(|| DELETED.to_string());
            let community_name = communities
                .get(&post.community_id)
                .cloned()
                .unwrap_or_else(|| DELETED.to_string());

            scored.push(ScoredPost {
                post,
                author_username,
                community_name,
                upvotes,
                downvotes,
                score: upvotes - downvotes,
            });
        }

        // recent() returns newest first, so a stable sort keeps recency as
        // the tie-break
        scored.sort_by(|a, b| b.score.cmp(&a.score));
        scored.truncate(limit as usize);

        Ok(scored)
    }

    async fn tallies(&self, post_id: Uuid) -> ServiceResult<(i64, i64)> {
        self.counters
            .count_pair(
                &vote_key(post_id, Polarity::Up),
                &vote_key(post_id, Polarity::Down),
            )
            .await
    }
}
