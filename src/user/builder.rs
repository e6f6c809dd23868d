//! Typed builder for NewUser.

use crate::user::{NewUser, UserId};

/// [`NewUser`] builder.
///
/// Optional profile fields missing from the provider are derived on
/// [`NewUserBuilder::build`].
#[derive(Debug, Clone)]
pub struct NewUserBuilder<ExternalId, Email> {
    external_id: ExternalId,
    email: Email,
    username: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    avatar_url: Option<String>,
}

/// Value is missing on [`NewUserBuilder`].
#[derive(Debug, Clone)]
pub struct Missing;

/// Value is present on [`NewUserBuilder`].
#[derive(Debug, Clone)]
pub struct Present<T>(pub T);

impl NewUserBuilder<Missing, Missing> {
    /// Create a new [`NewUserBuilder`].
    pub fn new() -> Self {
        Self {
            external_id: Missing,
            email: Missing,
            username: None,
            first_name: None,
            last_name: None,
            avatar_url: None,
        }
    }
}

impl Default for NewUserBuilder<Missing, Missing> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Email> NewUserBuilder<Missing, Email> {
    /// Update `external_id` field on [`NewUserBuilder`].
    pub fn external_id(
        self,
        external_id: impl Into<String>,
    ) -> NewUserBuilder<Present<String>, Email> {
        NewUserBuilder {
            external_id: Present(external_id.into()),
            email: self.email,
            username: self.username,
            first_name: self.first_name,
            last_name: self.last_name,
            avatar_url: self.avatar_url,
        }
    }
}

impl<ExternalId> NewUserBuilder<ExternalId, Missing> {
    /// Update `email` field on [`NewUserBuilder`].
    pub fn email(
        self,
        email: impl Into<String>,
    ) -> NewUserBuilder<ExternalId, Present<String>> {
        NewUserBuilder {
            external_id: self.external_id,
            email: Present(email.into()),
            username: self.username,
            first_name: self.first_name,
            last_name: self.last_name,
            avatar_url: self.avatar_url,
        }
    }
}

impl<ExternalId, Email> NewUserBuilder<ExternalId, Email> {
    /// Update `username` field on [`NewUserBuilder`].
    pub fn username(mut self, username: Option<String>) -> Self {
        self.username = username;
        self
    }

    /// Update `first_name` field on [`NewUserBuilder`].
    pub fn first_name(mut self, first_name: Option<String>) -> Self {
        self.first_name = first_name;
        self
    }

    /// Update `last_name` field on [`NewUserBuilder`].
    pub fn last_name(mut self, last_name: Option<String>) -> Self {
        self.last_name = last_name;
        self
    }

    /// Update `avatar_url` field on [`NewUserBuilder`].
    pub fn avatar_url(mut self, avatar_url: Option<String>) -> Self {
        self.avatar_url = avatar_url;
        self
    }
}

impl NewUserBuilder<Present<String>, Present<String>> {
    /// Build a [`NewUser`] with a fresh [`UserId`].
    pub fn build(self) -> NewUser {
        let email = self.email.0;
        let username = match self.username {
            Some(username) if !username.is_empty() => username,
            _ => email_local_part(&email).to_owned(),
        };
        let name =
            display_name(self.first_name.as_deref(), self.last_name.as_deref());

        NewUser {
            id: UserId::generate(),
            external_id: self.external_id.0,
            email,
            username,
            name,
            avatar_url: self.avatar_url,
        }
    }
}

/// Part of `email` before its first `@`.
fn email_local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

/// First and last name joined by a space, `None` if nothing remains.
fn display_name(first_name: Option<&str>, last_name: Option<&str>) -> Option<String> {
    let name = format!(
        "{} {}",
        first_name.unwrap_or_default(),
        last_name.unwrap_or_default()
    );
    let name = name.trim();

    (!name.is_empty()).then(|| name.to_owned())
}
