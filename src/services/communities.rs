use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Community, EnrichedPost};
use crate::error::{ServiceError, ServiceResult};
use crate::repository::{CommunityRepository, PostRepository};

use super::posts::enrich_posts;

/// Community creation and reads
#[derive(Clone)]
pub struct CommunityService {
    pool: PgPool,
    communities: CommunityRepository,
    posts: PostRepository,
}

impl CommunityService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            communities: CommunityRepository::new(pool.clone()),
            posts: PostRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a community; names are globally unique.
    pub async fn create(
        &self,
        caller: Option<Uuid>,
        name: &str,
        description: Option<&str>,
    ) -> ServiceResult<Community> {
        let author_id = caller.ok_or(ServiceError::Unauthenticated)?;

        self.communities
            .insert(name, description, author_id)
            .await?
            .ok_or_else(|| ServiceError::DuplicateName(name.to_string()))
    }

    /// A community by name together with its posts; `None` when unknown.
    pub async fn get_with_posts(
        &self,
        name: &str,
    ) -> ServiceResult<Option<(Community, Vec<EnrichedPost>)>> {
        let Some(community) = self.communities.find_by_name(name).await? else {
            return Ok(None);
        };

        let posts = self.posts.by_community(community.id).await?;
        let posts = enrich_posts(&self.pool, posts).await?;

        Ok(Some((community, posts)))
    }
}
