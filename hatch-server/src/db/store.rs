//! Store capability traits

use async_trait::async_trait;

use crate::models::{EmailAddress, NewUser, Pagination, Sort, User, UserChanges};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Store cannot be reached (pool exhausted, connection refused)
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::UniqueViolation {
                constraint: db.constraint().unwrap_or("unique").to_owned(),
            },
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => Self::Unavailable(e.to_string()),
            _ => Self::Database(e),
        }
    }
}

/// Opens sessions against the user store.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Start a transaction.
    async fn begin(&self) -> Result<Box<dyn UserSession>, StoreError>;

    /// Cheap connectivity check for health endpoints.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// One transaction. Dropping a session without committing rolls it back.
#[async_trait]
pub trait UserSession: Send {
    async fn find_by_id(&mut self, id: i64) -> Result<Option<User>, StoreError>;

    async fn find_by_email(&mut self, email: &EmailAddress) -> Result<Option<User>, StoreError>;

    /// One page plus the total row count.
    async fn list(&mut self, page: Pagination, sort: Sort) -> Result<(Vec<User>, u64), StoreError>;

    async fn insert(&mut self, user: &NewUser) -> Result<User, StoreError>;

    /// `None` when no row has `id`.
    async fn update(&mut self, id: i64, changes: &UserChanges) -> Result<Option<User>, StoreError>;

    /// `false` when no row has `id`.
    async fn delete(&mut self, id: i64) -> Result<bool, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
