//! PostgreSQL implementation of [`UserStore`].

use async_trait::async_trait;
use sqlx::PgPool;

use crate::user::{
    LocalUser, NewUser, StoreError, StoreResult, UserCounts, UserId, UserStore,
};

const UNIQUE_VIOLATION: &str = "23505";
const EXTERNAL_ID_CONSTRAINT: &str = "users_external_id_key";

/// PostgreSQL user store.
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    /// Create a new [`PgUserStore`].
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Whether `err` is the unique violation on `users.external_id`.
fn is_external_id_conflict(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|e| violates_external_id(e.code().as_deref(), e.constraint()))
}

fn violates_external_id(code: Option<&str>, constraint: Option<&str>) -> bool {
    code == Some(UNIQUE_VIOLATION) && constraint == Some(EXTERNAL_ID_CONSTRAINT)
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> StoreResult<Option<LocalUser>> {
        Ok(sqlx::query_as::<_, LocalUser>(
            r#"
            SELECT
                id, external_id, email, username, name, avatar_url,
                created_at, updated_at
            FROM users
            WHERE external_id = $1
            "#,
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn insert(&self, user: NewUser) -> StoreResult<LocalUser> {
        sqlx::query_as::<_, LocalUser>(
            r#"
            INSERT INTO users (id, external_id, email, username, name, avatar_url)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING
                id, external_id, email, username, name, avatar_url,
                created_at, updated_at
            "#,
        )
        .bind(&user.id)
        .bind(&user.external_id)
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.name)
        .bind(&user.avatar_url)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| {
            if is_external_id_conflict(&err) {
                StoreError::Conflict {
                    external_id: user.external_id.clone(),
                }
            } else {
                StoreError::Sql(err)
            }
        })
    }

    async fn counts(&self, id: &UserId) -> StoreResult<UserCounts> {
        let (followers, following, posts): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM follows WHERE following_id = $1),
                (SELECT COUNT(*) FROM follows WHERE follower_id = $1),
                (SELECT COUNT(*) FROM posts WHERE author_id = $1)
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(UserCounts {
            followers,
            following,
            posts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_id_violation() {
        assert!(violates_external_id(Some("23505"), Some("users_external_id_key")));
        assert!(!violates_external_id(Some("23505"), Some("users_username_key")));
        assert!(!violates_external_id(Some("23503"), Some("users_external_id_key")));
        assert!(!violates_external_id(None, None));
        assert!(!is_external_id_conflict(&sqlx::Error::RowNotFound));
    }
}

// Needs a live PostgreSQL reachable through `DATABASE_URL`:
// `cargo test --features postgres-tests`.
#[cfg(all(test, feature = "postgres-tests"))]
mod database_tests {
    use sqlx::{Pool, Postgres};

    use super::*;

    fn new_user(external_id: &str) -> NewUser {
        NewUser {
            id: UserId::generate(),
            external_id: external_id.to_owned(),
            email: "peggy@strickland.com".to_owned(),
            username: "peggy".to_owned(),
            name: Some("Peggy Hill".to_owned()),
            avatar_url: None,
        }
    }

    #[sqlx::test(fixtures("../../fixtures/users.sql"))]
    async fn test_find_by_external_id(pool: Pool<Postgres>) {
        let store = PgUserStore::new(pool);

        let user = store.find_by_external_id("user_hank").await.unwrap().unwrap();
        assert_eq!(user.id.as_str(), "hank000000000000000000001");
        assert_eq!(user.username, "hank");
        assert_eq!(user.name.as_deref(), Some("Hank Hill"));

        assert!(store.find_by_external_id("user_nobody").await.unwrap().is_none());
    }

    #[sqlx::test(fixtures("../../fixtures/users.sql"))]
    async fn test_insert_conflict(pool: Pool<Postgres>) {
        let store = PgUserStore::new(pool);

        let created = store.insert(new_user("user_peggy")).await.unwrap();
        assert_eq!(created.external_id, "user_peggy");
        assert_eq!(created.email, "peggy@strickland.com");

        let err = store.insert(new_user("user_peggy")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[sqlx::test(fixtures("../../fixtures/users.sql"))]
    async fn test_counts(pool: Pool<Postgres>) {
        let store = PgUserStore::new(pool);
        let id = UserId::from("hank000000000000000000001".to_owned());

        let counts = store.counts(&id).await.unwrap();
        assert_eq!(
            counts,
            UserCounts {
                followers: 1,
                following: 0,
                posts: 2,
            }
        );
    }
}
