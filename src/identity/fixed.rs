//! In-process identity provider with a fixed token table.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::identity::{ExternalIdentity, IdentityProvider, SessionContext};

/// Identity provider answering from a fixed token to identity table.
///
/// Useful for local development and tests.
#[derive(Clone, Debug, Default)]
pub struct StaticIdentityProvider {
    sessions: HashMap<String, ExternalIdentity>,
}

impl StaticIdentityProvider {
    /// Create an empty [`StaticIdentityProvider`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `identity` behind session `token`.
    pub fn with_session(
        mut self,
        token: impl Into<String>,
        identity: ExternalIdentity,
    ) -> Self {
        self.sessions.insert(token.into(), identity);
        self
    }

    fn lookup(&self, session: &SessionContext) -> Option<&ExternalIdentity> {
        session.token().and_then(|token| self.sessions.get(token))
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn resolve_session_subject(
        &self,
        session: &SessionContext,
    ) -> Option<String> {
        self.lookup(session).map(|identity| identity.external_id.clone())
    }

    async fn resolve_session_identity(
        &self,
        session: &SessionContext,
    ) -> Option<ExternalIdentity> {
        self.lookup(session).cloned()
    }
}
