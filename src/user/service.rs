//! Reconcile provider identities with local users.

use std::sync::Arc;

use crate::identity::{IdentityProvider, SessionContext};
use crate::telemetry;
use crate::user::{
    LocalUser, NewUserBuilder, StoreError, UserId, UserProfile, UserStore,
};

pub type Result<T> = std::result::Result<T, UserError>;

/// Errors returned by [`IdentityService`].
#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("user not found")]
    UserNotFound,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Why [`IdentityService::sync_user`] did nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// No provider session is active.
    NoActiveSession,
    /// The provider returned no email address.
    IncompleteProfile,
}

/// Result of a user synchronization.
#[derive(Clone, Debug, PartialEq)]
pub enum SyncOutcome {
    /// User was already known.
    Existing(LocalUser),
    /// User has just been created.
    Created(LocalUser),
    /// Nothing to synchronize.
    Skipped(SkipReason),
}

impl SyncOutcome {
    /// Synchronized user, if any.
    pub fn user(&self) -> Option<&LocalUser> {
        match self {
            SyncOutcome::Existing(user) | SyncOutcome::Created(user) => Some(user),
            SyncOutcome::Skipped(_) => None,
        }
    }

    /// Consume outcome and return synchronized user, if any.
    pub fn into_user(self) -> Option<LocalUser> {
        match self {
            SyncOutcome::Existing(user) | SyncOutcome::Created(user) => Some(user),
            SyncOutcome::Skipped(_) => None,
        }
    }

    pub(crate) fn label(&self) -> &'static str {
        match self {
            SyncOutcome::Existing(_) => "existing",
            SyncOutcome::Created(_) => "created",
            SyncOutcome::Skipped(SkipReason::NoActiveSession) => "no_session",
            SyncOutcome::Skipped(SkipReason::IncompleteProfile) => "incomplete_profile",
        }
    }
}

/// User manager.
#[derive(Clone)]
pub struct IdentityService {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn UserStore>,
}

impl IdentityService {
    /// Create a new [`IdentityService`].
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn UserStore>,
    ) -> Self {
        Self { provider, store }
    }

    /// Find or create the local user of the session caller.
    ///
    /// Missing sessions and profiles without email are not errors, they
    /// return [`SyncOutcome::Skipped`]. Only store failures are propagated.
    #[tracing::instrument(skip_all)]
    pub async fn sync_user(&self, session: &SessionContext) -> Result<SyncOutcome> {
        let outcome = self.reconcile(session).await?;
        metrics::counter!(telemetry::USERS_SYNCED, "outcome" => outcome.label())
            .increment(1);
        Ok(outcome)
    }

    async fn reconcile(&self, session: &SessionContext) -> Result<SyncOutcome> {
        let Some(identity) = self.provider.resolve_session_identity(session).await
        else {
            tracing::debug!("no active session, nothing to synchronize");
            return Ok(SyncOutcome::Skipped(SkipReason::NoActiveSession));
        };

        if let Some(user) =
            self.store.find_by_external_id(&identity.external_id).await?
        {
            return Ok(SyncOutcome::Existing(user));
        }

        let Some(email) = identity.emails.first() else {
            tracing::warn!(
                external_id = %identity.external_id,
                "no email address found for user"
            );
            return Ok(SyncOutcome::Skipped(SkipReason::IncompleteProfile));
        };

        let new_user = NewUserBuilder::new()
            .external_id(identity.external_id.clone())
            .email(email.clone())
            .username(identity.username)
            .first_name(identity.first_name)
            .last_name(identity.last_name)
            .avatar_url(identity.avatar_url)
            .build();

        match self.store.insert(new_user).await {
            Ok(user) => {
                tracing::info!(user_id = %user.id, "user synced successfully");
                Ok(SyncOutcome::Created(user))
            },
            // A concurrent request created the same user first.
            Err(StoreError::Conflict { external_id }) => {
                tracing::debug!(%external_id, "lost user creation race");
                match self.store.find_by_external_id(&external_id).await? {
                    Some(user) => Ok(SyncOutcome::Existing(user)),
                    None => Err(StoreError::Conflict { external_id }.into()),
                }
            },
            Err(err) => {
                tracing::error!(error = %err, "error syncing user");
                Err(err.into())
            },
        }
    }

    /// Find a user and its counters by external id.
    pub async fn get_user_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<UserProfile>> {
        let Some(user) = self.store.find_by_external_id(external_id).await?
        else {
            return Ok(None);
        };
        let counts = self.store.counts(&user.id).await?;

        Ok(Some(UserProfile { user, counts }))
    }

    /// Local id of the session caller.
    ///
    /// Unlike [`IdentityService::sync_user`], a missing session is an
    /// error here, and the user is never created.
    pub async fn get_db_user_id(&self, session: &SessionContext) -> Result<UserId> {
        let external_id = self
            .provider
            .resolve_session_subject(session)
            .await
            .ok_or(UserError::Unauthorized)?;

        self.store
            .find_by_external_id(&external_id)
            .await?
            .map(|user| user.id)
            .ok_or(UserError::UserNotFound)
    }
}
