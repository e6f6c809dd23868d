//! Identity provider port and adapters.
//!
//! The provider is the source of truth for who the caller is. Everything it
//! returns is a snapshot taken at request time; nothing here touches the
//! local store.
mod fixed;
mod jwt;

pub use fixed::*;
pub use jwt::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Request-scoped session capability handed over by the hosting layer.
///
/// Holds the raw provider session token when a session is active.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionContext {
    token: Option<String>,
}

impl SessionContext {
    /// Create a [`SessionContext`] carrying a provider session token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    /// Create a [`SessionContext`] without any active session.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Provider session token, if any.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }
}

/// Profile snapshot of the authenticated caller, as known by the provider.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalIdentity {
    /// Provider subject identifier.
    pub external_id: String,
    /// Email addresses, primary first.
    pub emails: Vec<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Port to the external identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Subject id of the caller, or `None` when no session is active.
    async fn resolve_session_subject(
        &self,
        session: &SessionContext,
    ) -> Option<String>;

    /// Full identity snapshot of the caller, or `None` when no session is
    /// active.
    async fn resolve_session_identity(
        &self,
        session: &SessionContext,
    ) -> Option<ExternalIdentity>;
}
