//! Resolve the owner of an access token
//!
//! The token store only needs "who does this token belong to" once per store
//! instance. [`HttpIdentityResolver`] answers it with a `GET users/me` call
//! against the API the token was issued for.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::error::IdentityError;

/// Maps a bearer access token to the stable identifier of its user
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve_current_user(&self, access_token: &str) -> Result<String, IdentityError>;
}

/// Identity resolver backed by the `users/me` endpoint
pub struct HttpIdentityResolver {
    client: Client,
    current_user_url: Url,
}

impl HttpIdentityResolver {
    /// Create a resolver for the API rooted at `base_url`.
    ///
    /// `timeout` bounds each request; the resolver never retries.
    pub fn new(base_url: &Url, timeout: Duration) -> Result<Self, IdentityError> {
        let current_user_url = with_trailing_slash(base_url)
            .join("users/me")
            .map_err(|e| IdentityError::InvalidUrl(e.to_string()))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IdentityError::Request(e.to_string()))?;

        Ok(Self {
            client,
            current_user_url,
        })
    }

    pub fn current_user_url(&self) -> &Url {
        &self.current_user_url
    }
}

/// `Url::join` drops the last path segment unless the base ends with `/`
fn with_trailing_slash(url: &Url) -> Url {
    let mut url = url.clone();
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Pull the user id out of a `users/me` body. Ids may be strings or numbers.
fn extract_user_id(body: &Value) -> Result<String, IdentityError> {
    match body.get("id") {
        Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
        Some(Value::Number(id)) => Ok(id.to_string()),
        _ => Err(IdentityError::MissingUserId),
    }
}

#[async_trait]
impl IdentityResolver for HttpIdentityResolver {
    async fn resolve_current_user(&self, access_token: &str) -> Result<String, IdentityError> {
        debug!("Resolving current user via {}", self.current_user_url);

        let response = self
            .client
            .get(self.current_user_url.clone())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| IdentityError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .ok()
                .filter(|body| !body.is_empty())
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                });
            warn!("Identity request failed with status {}", status);
            return Err(IdentityError::Status {
                status: status.as_u16(),
                message,
            });
        }

        if status == StatusCode::NO_CONTENT {
            return Err(IdentityError::MissingUserId);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| IdentityError::InvalidResponse(e.to_string()))?;

        let user_id = extract_user_id(&body)?;
        debug!("Resolved current user: {}", user_id);
        Ok(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, http::StatusCode as AxumStatus, routing::get, Json, Router};
    use serde_json::json;

    /// Serve a fake `users/me` that answers `user42` for `Bearer tok1`
    async fn spawn_identity_server() -> Url {
        async fn users_me(headers: HeaderMap) -> Result<Json<Value>, (AxumStatus, String)> {
            match headers.get("authorization").and_then(|v| v.to_str().ok()) {
                Some("Bearer tok1") => Ok(Json(json!({ "type": "user", "id": "user42" }))),
                Some("Bearer numeric") => Ok(Json(json!({ "id": 9001 }))),
                Some("Bearer anonymous") => Ok(Json(json!({ "type": "user" }))),
                _ => Err((AxumStatus::UNAUTHORIZED, "invalid_token".to_string())),
            }
        }

        let app = Router::new().route("/2.0/users/me", get(users_me));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Url::parse(&format!("http://{}/2.0", addr)).unwrap()
    }

    fn resolver(base_url: &Url) -> HttpIdentityResolver {
        HttpIdentityResolver::new(base_url, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_current_user_url_keeps_base_path() {
        let base = Url::parse("https://api.example.com/2.0").unwrap();
        assert_eq!(
            resolver(&base).current_user_url().as_str(),
            "https://api.example.com/2.0/users/me"
        );

        let base = Url::parse("https://api.example.com/2.0/").unwrap();
        assert_eq!(
            resolver(&base).current_user_url().as_str(),
            "https://api.example.com/2.0/users/me"
        );
    }

    #[test]
    fn test_extract_user_id() {
        assert_eq!(extract_user_id(&json!({ "id": "7" })).unwrap(), "7");
        assert_eq!(extract_user_id(&json!({ "id": 7 })).unwrap(), "7");
        assert!(matches!(
            extract_user_id(&json!({ "id": "" })),
            Err(IdentityError::MissingUserId)
        ));
        assert!(matches!(
            extract_user_id(&json!({ "name": "x" })),
            Err(IdentityError::MissingUserId)
        ));
    }

    #[tokio::test]
    async fn test_resolve_current_user() {
        let base = spawn_identity_server().await;

        let user_id = resolver(&base).resolve_current_user("tok1").await.unwrap();
        assert_eq!(user_id, "user42");

        let user_id = resolver(&base).resolve_current_user("numeric").await.unwrap();
        assert_eq!(user_id, "9001");
    }

    #[tokio::test]
    async fn test_rejected_token_reports_status() {
        let base = spawn_identity_server().await;

        let err = resolver(&base)
            .resolve_current_user("expired")
            .await
            .unwrap_err();

        match err {
            IdentityError::Status { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "invalid_token");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_response_without_id() {
        let base = spawn_identity_server().await;

        let err = resolver(&base)
            .resolve_current_user("anonymous")
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::MissingUserId));
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        // Bind then drop to get a port nobody listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let base = Url::parse(&format!("http://{}/2.0", addr)).unwrap();
        let err = resolver(&base).resolve_current_user("tok1").await.unwrap_err();
        assert!(matches!(err, IdentityError::Request(_)));
    }
}
