//! Users-related HTTP API.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::Result;
use crate::identity::SessionContext;
use crate::router::ValidPath;
use crate::telemetry::SyncLabel;
use crate::user::{LocalUser, SyncOutcome, UserError, UserId, UserProfile};
use crate::{AppState, ServerError};

pub fn router() -> Router<AppState> {
    Router::new()
        // `POST /users/sync` goes to `sync`.
        .route("/sync", post(sync))
        // `GET /users/@me/id` goes to `me`. Session required.
        .route("/@me/id", get(me))
        // `GET /users/:EXTERNAL_ID` goes to `get`.
        .route("/{external_id}", get(get_by_external_id))
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct SyncResponse {
    pub user: LocalUser,
    pub created: bool,
}

/// Find or create the local user of the caller.
///
/// Answers `201` on creation, `200` when the user already existed and `204`
/// when there was nothing to synchronize.
pub async fn sync(
    State(state): State<AppState>,
    session: SessionContext,
) -> Result<Response> {
    let outcome = state.users.sync_user(&session).await?;
    let label = SyncLabel(outcome.label());

    let response = match outcome {
        SyncOutcome::Created(user) => (
            StatusCode::CREATED,
            Json(SyncResponse {
                user,
                created: true,
            }),
        )
            .into_response(),
        SyncOutcome::Existing(user) => Json(SyncResponse {
            user,
            created: false,
        })
        .into_response(),
        SyncOutcome::Skipped(_) => StatusCode::NO_CONTENT.into_response(),
    };

    Ok((Extension(label), response).into_response())
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct IdResponse {
    pub id: UserId,
}

pub async fn me(
    State(state): State<AppState>,
    session: SessionContext,
) -> Result<Json<IdResponse>> {
    let id = state.users.get_db_user_id(&session).await?;
    Ok(Json(IdResponse { id }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ExternalIdPath {
    #[validate(length(
        min = 1,
        max = 255,
        message = "External ID must be 1 to 255 characters long."
    ))]
    external_id: String,
}

pub async fn get_by_external_id(
    State(state): State<AppState>,
    ValidPath(path): ValidPath<ExternalIdPath>,
) -> Result<Json<UserProfile>> {
    state
        .users
        .get_user_by_external_id(&path.external_id)
        .await?
        .map(Json)
        .ok_or(ServerError::User(UserError::UserNotFound))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use http_body_util::BodyExt;
    use serde::de::DeserializeOwned;

    use super::*;
    use crate::identity::ExternalIdentity;
    use crate::user::{MemoryUserStore, UserCounts};
    use crate::*;

    const TOKEN: &str = "sess_hank";

    fn state(store: MemoryUserStore, emails: Vec<String>) -> AppState {
        let identity = ExternalIdentity {
            external_id: "user_hank".to_owned(),
            emails,
            username: None,
            first_name: Some("Hank".to_owned()),
            last_name: None,
            avatar_url: None,
        };
        test_state(
            identity::StaticIdentityProvider::new().with_session(TOKEN, identity),
            store,
        )
    }

    async fn json<T: DeserializeOwned>(response: axum::response::Response) -> T {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_sync_handler() {
        let store = MemoryUserStore::new();
        let app = app(state(store.clone(), vec!["hank@strickland.com".to_owned()]));

        let response =
            make_request(Some(TOKEN), app.clone(), Method::POST, "/users/sync").await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            response.extensions().get::<SyncLabel>(),
            Some(&SyncLabel("created"))
        );
        let created: SyncResponse = json(response).await;
        assert!(created.created);
        assert_eq!(created.user.username, "hank");
        assert_eq!(created.user.name.as_deref(), Some("Hank"));

        let response =
            make_request(Some(TOKEN), app.clone(), Method::POST, "/users/sync").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.extensions().get::<SyncLabel>(),
            Some(&SyncLabel("existing"))
        );
        let existing: SyncResponse = json(response).await;
        assert!(!existing.created);
        assert_eq!(existing.user.id, created.user.id);

        let response = make_request(None, app, Method::POST, "/users/sync").await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response.extensions().get::<SyncLabel>(),
            Some(&SyncLabel("no_session"))
        );
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test]
    async fn test_sync_handler_without_email() {
        let store = MemoryUserStore::new();
        let app = app(state(store.clone(), Vec::new()));

        let response = make_request(Some(TOKEN), app, Method::POST, "/users/sync").await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn test_me_handler() {
        let store = MemoryUserStore::new();
        let app = app(state(store, vec!["hank@strickland.com".to_owned()]));

        let response = make_request(None, app.clone(), Method::GET, "/users/@me/id").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response =
            make_request(Some(TOKEN), app.clone(), Method::GET, "/users/@me/id").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response =
            make_request(Some(TOKEN), app.clone(), Method::POST, "/users/sync").await;
        let created: SyncResponse = json(response).await;

        let response = make_request(Some(TOKEN), app, Method::GET, "/users/@me/id").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: IdResponse = json(response).await;
        assert_eq!(body.id, created.user.id);
    }

    #[tokio::test]
    async fn test_get_handler() {
        let store = MemoryUserStore::new();
        let app = app(state(store.clone(), vec!["hank@strickland.com".to_owned()]));

        let response =
            make_request(None, app.clone(), Method::GET, "/users/user_hank").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response =
            make_request(Some(TOKEN), app.clone(), Method::POST, "/users/sync").await;
        let created: SyncResponse = json(response).await;
        store
            .set_counts(
                &created.user.id,
                UserCounts {
                    followers: 2,
                    following: 5,
                    posts: 1,
                },
            )
            .await;

        let response = make_request(None, app, Method::GET, "/users/user_hank").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = json(response).await;
        assert_eq!(body["externalId"], "user_hank");
        assert_eq!(body["id"], created.user.id.as_str());
        assert_eq!(body["_count"]["followers"], 2);
        assert_eq!(body["_count"]["following"], 5);
        assert_eq!(body["_count"]["posts"], 1);
    }

    #[tokio::test]
    async fn test_get_handler_rejects_long_ids() {
        let app = app(state(MemoryUserStore::new(), Vec::new()));

        let path = format!("/users/{}", "a".repeat(256));
        let response = make_request(None, app, Method::GET, &path).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
