mod builder;
mod memory;
mod postgres;
mod repository;
mod service;

pub use builder::*;
pub use memory::*;
pub use postgres::*;
pub use repository::*;
pub use service::*;

use std::fmt;

use chrono::{DateTime, Utc};
use rand::distributions::{Alphanumeric, DistString};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

const ID_LENGTH: usize = 25;

/// Locally generated identifier of a [`LocalUser`].
#[derive(
    Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct UserId(String);

impl UserId {
    /// Generate a new random [`UserId`].
    pub fn generate() -> Self {
        Self(Alphanumeric.sample_string(&mut OsRng, ID_LENGTH).to_lowercase())
    }

    /// Returns the same string as a string slice `&str`.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// User as saved on database.
#[derive(
    Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow,
)]
#[serde(rename_all = "camelCase")]
pub struct LocalUser {
    pub id: UserId,
    pub external_id: String,
    pub email: String,
    pub username: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to insert a [`LocalUser`].
///
/// Built by [`NewUserBuilder`] from an external identity snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct NewUser {
    pub id: UserId,
    pub external_id: String,
    pub email: String,
    pub username: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Aggregate counters owned by the follow and post subsystems.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCounts {
    pub followers: i64,
    pub following: i64,
    pub posts: i64,
}

/// A [`LocalUser`] merged with its [`UserCounts`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: LocalUser,
    #[serde(rename = "_count")]
    pub counts: UserCounts,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id() {
        let first = UserId::generate();
        let second = UserId::generate();

        assert_eq!(first.as_str().len(), ID_LENGTH);
        assert!(first.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(first, second);
    }
}
