//! In-memory implementation of [`UserStore`].

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::user::{
    LocalUser, NewUser, StoreError, StoreResult, UserCounts, UserId, UserStore,
};

/// User store kept in process memory, keyed by external id.
///
/// Counters are never derived here, they must be seeded with
/// [`MemoryUserStore::set_counts`].
#[derive(Clone, Default)]
pub struct MemoryUserStore {
    users: Arc<RwLock<HashMap<String, LocalUser>>>,
    counts: Arc<RwLock<HashMap<UserId, UserCounts>>>,
    writes: Arc<AtomicUsize>,
}

impl MemoryUserStore {
    /// Create an empty [`MemoryUserStore`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite counters of user `id`.
    pub async fn set_counts(&self, id: &UserId, counts: UserCounts) {
        self.counts.write().await.insert(id.clone(), counts);
    }

    /// Number of successful inserts since creation.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of stored users.
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    /// Whether no user is stored.
    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> StoreResult<Option<LocalUser>> {
        Ok(self.users.read().await.get(external_id).cloned())
    }

    async fn insert(&self, user: NewUser) -> StoreResult<LocalUser> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.external_id) {
            return Err(StoreError::Conflict {
                external_id: user.external_id,
            });
        }

        let now = Utc::now();
        let record = LocalUser {
            id: user.id,
            external_id: user.external_id,
            email: user.email,
            username: user.username,
            name: user.name,
            avatar_url: user.avatar_url,
            created_at: now,
            updated_at: now,
        };
        users.insert(record.external_id.clone(), record.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);

        Ok(record)
    }

    async fn counts(&self, id: &UserId) -> StoreResult<UserCounts> {
        Ok(self.counts.read().await.get(id).copied().unwrap_or_default())
    }
}
