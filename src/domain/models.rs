use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Vote direction. Stored as the `polarity` column of the votes table;
/// a user holds at most one vote per post across both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    #[sqlx(rename = "up")]
    Up,
    #[sqlx(rename = "down")]
    Down,
}

impl Polarity {
    pub fn opposite(self) -> Self {
        match self {
            Polarity::Up => Polarity::Down,
            Polarity::Down => Polarity::Up,
        }
    }

    /// Counter-key namespace for this direction
    pub fn key_namespace(self) -> &'static str {
        match self {
            Polarity::Up => "upvote",
            Polarity::Down => "downvote",
        }
    }
}

/// User entity - created on first authenticated interaction
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    /// Stable identity from the external authentication provider
    pub external_id: String,
    pub created_at: DateTime<Utc>,
}

/// Community entity ("subreddit")
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Community {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Post entity
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub community_id: Uuid,
    pub subject: String,
    pub body: String,
    /// Opaque reference into external image storage
    pub image_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Comment entity - never updated after creation
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Vote entity - one row per (post, user) at most, tagged with its direction
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Vote {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub polarity: Polarity,
    pub created_at: DateTime<Utc>,
}

/// Aggregated vote tallies for a post. `total` may be negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCounts {
    pub upvotes: i64,
    pub downvotes: i64,
    pub total: i64,
}

/// Post joined with display data; missing references render as "[deleted]"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedPost {
    pub post: Post,
    pub author_username: String,
    pub community_name: String,
}

/// Comment joined with its author's username
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentWithAuthor {
    pub comment: Comment,
    pub author_username: String,
}

/// Leaderboard entry: enriched post plus its vote tallies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPost {
    pub post: Post,
    pub author_username: String,
    pub community_name: String,
    pub upvotes: i64,
    pub downvotes: i64,
    pub score: i64,
}
