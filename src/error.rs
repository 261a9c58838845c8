/// Error types for community-service
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Name already taken: {0}")]
    DuplicateName(String),

    /// Concurrent writers raced on the same rows and the retry budget ran out.
    /// The only transient variant; callers may resubmit.
    #[error("Transaction conflict, retries exhausted")]
    Conflict,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ServiceError {
    /// SQLSTATE codes Postgres raises when a serializable transaction must be
    /// retried: 40001 serialization_failure, 40P01 deadlock_detected.
    pub fn is_retryable(err: &sqlx::Error) -> bool {
        match err {
            sqlx::Error::Database(db) => {
                matches!(db.code().as_deref(), Some("40001") | Some("40P01"))
            }
            _ => false,
        }
    }

    /// Unique-constraint violation (SQLSTATE 23505). On read-decide-write
    /// paths this can be a race with a non-serializable writer and is worth
    /// a re-read rather than a hard failure.
    pub fn is_unique_violation(err: &sqlx::Error) -> bool {
        match err {
            sqlx::Error::Database(db) => db.is_unique_violation(),
            _ => false,
        }
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;
