//! Public instance status and metrics.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::AppState;

/// Structured public configuration.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub name: String,
    pub url: String,
    pub version: String,
}

/// Public server status (configuration).
pub async fn status(State(state): State<AppState>) -> Json<Status> {
    let name = if state.config.name.is_empty() {
        env!("CARGO_CRATE_NAME").to_owned()
    } else {
        state.config.name.clone()
    };

    Json(Status {
        name,
        url: state.config.url.clone(),
        version: env!("CARGO_PKG_VERSION").to_owned(),
    })
}

/// Prometheus exposition of recorded metrics.
pub async fn metrics(
    State(state): State<AppState>,
) -> Result<String, StatusCode> {
    state
        .metrics
        .as_ref()
        .map(|handle| handle.render())
        .ok_or(StatusCode::NOT_FOUND)
}

#[cfg(test)]
mod tests {
    use axum::http::Method;
    use http_body_util::BodyExt;

    use super::*;
    use crate::*;

    #[tokio::test]
    async fn test_status_handler() {
        let state = test_state(
            identity::StaticIdentityProvider::new(),
            user::MemoryUserStore::new(),
        );
        let app = app(state);

        let response = make_request(None, app.clone(), Method::GET, "/status.json").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: Status = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.name, "novus");
        assert_eq!(body.version, env!("CARGO_PKG_VERSION"));

        // No recorder is installed in tests.
        let response = make_request(None, app, Method::GET, "/metrics").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
