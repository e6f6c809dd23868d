//! Persistent user store port.

use async_trait::async_trait;

use crate::user::{LocalUser, NewUser, UserCounts, UserId};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors raised by a [`UserStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A user with the same external identifier already exists.
    #[error("user with external id `{external_id}` already exists")]
    Conflict { external_id: String },

    #[error("SQL request failed: {0}")]
    Sql(#[from] sqlx::Error),
}

/// Port for user persistence.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Find a user by its external identity provider subject.
    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> StoreResult<Option<LocalUser>>;

    /// Insert a new user.
    ///
    /// Fails with [`StoreError::Conflict`] when a user with the same
    /// `external_id` already exists.
    async fn insert(&self, user: NewUser) -> StoreResult<LocalUser>;

    /// Read aggregate counters of a user.
    async fn counts(&self, id: &UserId) -> StoreResult<UserCounts>;
}
