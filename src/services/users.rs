use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::User;
use crate::error::{ServiceError, ServiceResult};
use crate::repository::UserRepository;

/// Identity boundary. The authentication oracle hands this service a stable
/// external identity; the user row is created on first contact.
#[derive(Clone)]
pub struct UserService {
    users: UserRepository,
}

impl UserService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// Resolve an authenticated external identity to a user, creating the
    /// row on first interaction.
    pub async fn get_or_create(&self, external_id: &str, username: &str) -> ServiceResult<User> {
        self.users.get_or_create(external_id, username).await
    }

    /// Resolve an optional external identity; `None` stays `None`
    /// (anonymous), unknown identities too.
    pub async fn current_user(&self, external_id: Option<&str>) -> ServiceResult<Option<User>> {
        match external_id {
            Some(ext) => self.users.find_by_external_id(ext).await,
            None => Ok(None),
        }
    }

    /// Like `current_user` but required: anonymous callers are rejected.
    pub async fn current_user_or_unauthenticated(
        &self,
        external_id: Option<&str>,
    ) -> ServiceResult<User> {
        self.current_user(external_id)
            .await?
            .ok_or(ServiceError::Unauthenticated)
    }

    pub async fn find_by_username(&self, username: &str) -> ServiceResult<Option<User>> {
        self.users.find_by_username(username).await
    }

    pub async fn find_by_id(&self, id: Uuid) -> ServiceResult<Option<User>> {
        self.users.find_by_id(id).await
    }
}
