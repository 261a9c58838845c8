/// Counter key construction.
///
/// Every logical counter is addressed by a namespaced string key. The mapping
/// is injective (the namespace prefix keeps entity kinds apart, the UUID keeps
/// entities apart) and stable across restarts, so keys can be persisted.
use uuid::Uuid;

use crate::domain::Polarity;

/// Key tracking the number of comments on a post: `comments:<postId>`
pub fn comment_count_key(post_id: Uuid) -> String {
    format!("comments:{post_id}")
}

/// Key tracking the number of posts by a user: `post:<userId>`
pub fn post_count_key(user_id: Uuid) -> String {
    format!("post:{user_id}")
}

/// Key tracking votes of one direction on a post:
/// `upvote:<postId>` / `downvote:<postId>`
pub fn vote_key(post_id: Uuid, polarity: Polarity) -> String {
    format!("{}:{post_id}", polarity.key_namespace())
}

/// Namespace of a key, i.e. the part before the first `:`.
/// Used to look up per-namespace shard configuration.
pub fn key_namespace(key: &str) -> &str {
    key.split(':').next().unwrap_or(key)
}
