use sqlx::PgPool;
use uuid::Uuid;

use crate::config::CounterConfig;
use crate::domain::{Polarity, VoteCounts};
use crate::error::{ServiceError, ServiceResult};
use crate::keys::vote_key;
use crate::repository::{CounterStore, PostRepository, VoteRepository};

/// Planned toggle transition for one `(user, post)` pair.
///
/// States are NoVote / Upvoted / Downvoted. Requesting the current direction
/// removes the vote; requesting the opposite direction swaps it; from NoVote
/// the requested vote is inserted. At most one removal and one insertion,
/// each paired with the matching counter update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct VoteTransition {
    /// Existing vote row to delete, with its direction (for the decrement)
    remove: Option<(Uuid, Polarity)>,
    /// Direction to insert (and increment)
    insert: Option<Polarity>,
}

impl VoteTransition {
    fn plan(current: Option<(Uuid, Polarity)>, requested: Polarity) -> Self {
        match current {
            None => Self {
                remove: None,
                insert: Some(requested),
            },
            Some((id, held)) if held == requested => Self {
                remove: Some((id, held)),
                insert: None,
            },
            Some((id, held)) => Self {
                remove: Some((id, held)),
                insert: Some(requested),
            },
        }
    }

    /// Resulting state: the active direction after the transition, if any
    fn next_state(&self) -> Option<Polarity> {
        self.insert
    }
}

/// Vote toggling and vote-count reads.
///
/// `toggle_vote` runs its read-decide-write sequence in one SERIALIZABLE
/// Postgres transaction: two concurrent toggles by the same user on the same
/// post cannot both observe NoVote and both insert. Serialization failures
/// are retried a bounded number of times before surfacing as `Conflict`.
#[derive(Clone)]
pub struct VoteService {
    pool: PgPool,
    votes: VoteRepository,
    posts: PostRepository,
    counters: CounterStore,
    toggle_retries: u32,
}

impl VoteService {
    pub fn new(pool: PgPool, config: &CounterConfig) -> Self {
        Self {
            votes: VoteRepository::new(pool.clone()),
            posts: PostRepository::new(pool.clone()),
            counters: CounterStore::new(pool.clone(), config),
            toggle_retries: config.toggle_retries.max(1),
            pool,
        }
    }

    /// Toggle the caller's vote on a post. Returns the direction now active,
    /// `None` when the toggle removed the vote.
    ///
    /// Requires an authenticated caller; rejects votes on missing posts with
    /// `NotFound` before any mutation.
    pub async fn toggle_vote(
        &self,
        caller: Option<Uuid>,
        post_id: Uuid,
        polarity: Polarity,
    ) -> ServiceResult<Option<Polarity>> {
        let user_id = caller.ok_or(ServiceError::Unauthenticated)?;

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            // A unique violation on the votes insert is also a race (a
            // writer outside the serializable path, e.g. a post delete,
            // changed the rows under us) and gets the same re-read.
            match self.toggle_once(user_id, post_id, polarity).await {
                Err(ServiceError::Database(err))
                    if ServiceError::is_retryable(&err)
                        || ServiceError::is_unique_violation(&err) =>
                {
                    if attempt >= self.toggle_retries {
                        tracing::warn!(
                            %post_id,
                            %user_id,
                            attempts = attempt,
                            "vote toggle retries exhausted"
                        );
                        return Err(ServiceError::Conflict);
                    }
                    tracing::debug!(%post_id, %user_id, attempt, "retrying vote toggle");
                }
                other => return other,
            }
        }
    }

    async fn toggle_once(
        &self,
        user_id: Uuid,
        post_id: Uuid,
        polarity: Polarity,
    ) -> ServiceResult<Option<Polarity>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(tx.as_mut())
            .await?;

        if !self.posts.exists(&mut tx, post_id).await? {
            return Err(ServiceError::NotFound(format!("post {post_id}")));
        }

        let current = self
            .votes
            .find_by_post_and_user(&mut tx, post_id, user_id)
            .await?
            .map(|v| (v.id, v.polarity));

        let transition = VoteTransition::plan(current, polarity);

        if let Some((vote_id, held)) = transition.remove {
            self.votes.delete(&mut tx, vote_id).await?;
            self.counters
                .decrement(&mut tx, &vote_key(post_id, held))
                .await?;
        }

        if let Some(inserted) = transition.insert {
            self.votes.insert(&mut tx, post_id, user_id, inserted).await?;
            self.counters
                .increment(&mut tx, &vote_key(post_id, inserted))
                .await?;
        }

        tx.commit().await?;
        Ok(transition.next_state())
    }

    /// Whether the caller holds a vote of exactly this direction on the post.
    /// `false` for anonymous callers, not an error.
    pub async fn has_voted(
        &self,
        caller: Option<Uuid>,
        post_id: Uuid,
        polarity: Polarity,
    ) -> ServiceResult<bool> {
        let Some(user_id) = caller else {
            return Ok(false);
        };
        self.votes.exists(post_id, user_id, polarity).await
    }

    /// Aggregated tallies for a post; all zero when nothing was ever
    /// recorded. `total` goes negative when downvotes outnumber upvotes.
    /// Both tallies come from one statement, so a concurrent polarity switch
    /// never shows half-applied.
    pub async fn get_vote_counts(&self, post_id: Uuid) -> ServiceResult<VoteCounts> {
        let (upvotes, downvotes) = self
            .counters
            .count_pair(
                &vote_key(post_id, Polarity::Up),
                &vote_key(post_id, Polarity::Down),
            )
            .await?;

        Ok(VoteCounts {
            upvotes,
            downvotes,
            total: upvotes - downvotes,
        })
    }
}
