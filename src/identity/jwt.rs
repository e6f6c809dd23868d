//! Identity provider backed by provider-issued session JWTs.

use std::str::FromStr;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::identity::{ExternalIdentity, IdentityProvider, SessionContext};

/// Errors raised while configuring a [`JwtIdentityProvider`].
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("invalid verification key: {0}")]
    Key(#[from] jsonwebtoken::errors::Error),
    #[error("algorithm `{0}` is not supported")]
    UnsupportedAlgorithm(String),
}

/// Pieces of information asserted on a provider session token.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Provider subject identifier.
    pub sub: String,
    /// Identifies the expiration time on or after which the JWT must not be
    /// accepted for processing.
    pub exp: u64,
    /// Identifies the organization that issued the JWT.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Every email address of the subject, primary first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub email_addresses: Vec<String>,
    /// Primary email address, for providers exposing a single one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl From<SessionClaims> for ExternalIdentity {
    fn from(claims: SessionClaims) -> Self {
        let mut emails = claims.email_addresses;
        if let Some(email) = claims.email {
            emails.retain(|address| *address != email);
            emails.insert(0, email);
        }

        Self {
            external_id: claims.sub,
            emails,
            username: claims.username,
            first_name: claims.first_name,
            last_name: claims.last_name,
            avatar_url: claims.image_url,
        }
    }
}

/// Verify session tokens and read the identity they carry.
#[derive(Clone)]
pub struct JwtIdentityProvider {
    key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityProvider {
    /// Create a new [`JwtIdentityProvider`].
    ///
    /// `key` is a PEM public key for asymmetric algorithms, or the shared
    /// secret for `HS*` algorithms.
    pub fn new(algorithm: &str, key: &str) -> Result<Self, ProviderError> {
        let algorithm = Algorithm::from_str(algorithm)
            .map_err(|_| ProviderError::UnsupportedAlgorithm(algorithm.to_owned()))?;

        let key = match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                DecodingKey::from_secret(key.as_bytes())
            },
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => DecodingKey::from_rsa_pem(key.as_bytes())?,
            Algorithm::ES256 | Algorithm::ES384 => {
                DecodingKey::from_ec_pem(key.as_bytes())?
            },
            Algorithm::EdDSA => DecodingKey::from_ed_pem(key.as_bytes())?,
        };

        let mut validation = Validation::new(algorithm);
        validation.validate_aud = false;

        Ok(Self { key, validation })
    }

    /// Only accept tokens issued by `issuer`.
    pub fn issuer(mut self, issuer: &str) -> Self {
        self.validation.set_issuer(&[issuer]);
        self
    }

    /// Only accept tokens intended for `audience`.
    pub fn audience(mut self, audience: &str) -> Self {
        self.validation.set_audience(&[audience]);
        self.validation.validate_aud = true;
        self
    }

    /// Decode and check a session token.
    fn claims(&self, session: &SessionContext) -> Option<SessionClaims> {
        let token = session.token()?;

        match decode::<SessionClaims>(token, &self.key, &self.validation) {
            Ok(data) if !data.claims.sub.is_empty() => Some(data.claims),
            Ok(_) => {
                tracing::debug!("session token has an empty subject");
                None
            },
            Err(err) => {
                tracing::debug!(error = %err, "session token rejected");
                None
            },
        }
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    async fn resolve_session_subject(
        &self,
        session: &SessionContext,
    ) -> Option<String> {
        self.claims(session).map(|claims| claims.sub)
    }

    async fn resolve_session_identity(
        &self,
        session: &SessionContext,
    ) -> Option<ExternalIdentity> {
        self.claims(session).map(ExternalIdentity::from)
    }
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use jsonwebtoken::{EncodingKey, Header, encode};

    use super::*;

    const SECRET: &str = "novus-test-secret";

    fn sign(claims: &SessionClaims) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .expect("cannot sign session token")
    }

    fn claims(sub: &str) -> SessionClaims {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();

        SessionClaims {
            sub: sub.to_owned(),
            exp: now + 600,
            iss: Some("https://clerk.novus.test".to_owned()),
            email_addresses: vec!["hank@strickland.com".to_owned()],
            username: Some("hank".to_owned()),
            first_name: Some("Hank".to_owned()),
            last_name: Some("Hill".to_owned()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_resolve_identity() {
        let provider = JwtIdentityProvider::new("HS256", SECRET).unwrap();
        let session = SessionContext::new(sign(&claims("user_2abc")));

        let identity = provider.resolve_session_identity(&session).await.unwrap();
        assert_eq!(identity.external_id, "user_2abc");
        assert_eq!(identity.emails, vec!["hank@strickland.com".to_owned()]);
        assert_eq!(identity.username.as_deref(), Some("hank"));
        assert_eq!(identity.first_name.as_deref(), Some("Hank"));
        assert_eq!(identity.avatar_url, None);

        assert_eq!(
            provider.resolve_session_subject(&session).await.as_deref(),
            Some("user_2abc")
        );
    }

    #[tokio::test]
    async fn test_single_email_claim_comes_first() {
        let provider = JwtIdentityProvider::new("HS256", SECRET).unwrap();
        let mut claims = claims("user_2abc");
        claims.email = Some("primary@example.com".to_owned());
        let session = SessionContext::new(sign(&claims));

        let identity = provider.resolve_session_identity(&session).await.unwrap();
        assert_eq!(
            identity.emails,
            vec![
                "primary@example.com".to_owned(),
                "hank@strickland.com".to_owned()
            ]
        );
    }

    #[tokio::test]
    async fn test_listed_email_claim_moves_first() {
        let provider = JwtIdentityProvider::new("HS256", SECRET).unwrap();
        let mut claims = claims("user_2abc");
        claims.email_addresses.push("primary@example.com".to_owned());
        claims.email = Some("primary@example.com".to_owned());
        let session = SessionContext::new(sign(&claims));

        let identity = provider.resolve_session_identity(&session).await.unwrap();
        assert_eq!(
            identity.emails,
            vec![
                "primary@example.com".to_owned(),
                "hank@strickland.com".to_owned()
            ]
        );
    }

    #[tokio::test]
    async fn test_rejected_tokens_mean_no_session() {
        let provider = JwtIdentityProvider::new("HS256", SECRET)
            .unwrap()
            .issuer("https://clerk.novus.test");

        assert!(
            provider
                .resolve_session_identity(&SessionContext::anonymous())
                .await
                .is_none()
        );
        assert!(
            provider
                .resolve_session_subject(&SessionContext::new("not.a.jwt"))
                .await
                .is_none()
        );

        let mut expired = claims("user_2abc");
        expired.exp = 1;
        assert!(
            provider
                .resolve_session_subject(&SessionContext::new(sign(&expired)))
                .await
                .is_none()
        );

        let mut foreign = claims("user_2abc");
        foreign.iss = Some("https://evil.test".to_owned());
        assert!(
            provider
                .resolve_session_subject(&SessionContext::new(sign(&foreign)))
                .await
                .is_none()
        );
    }

    #[test]
    fn test_unsupported_algorithm() {
        assert!(matches!(
            JwtIdentityProvider::new("none", SECRET),
            Err(ProviderError::UnsupportedAlgorithm(_))
        ));
    }
}
