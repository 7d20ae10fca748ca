use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use chatt_core::errors::ApiError;
use chatt_core::ids::UserId;
use chatt_core::message::{ChatMessage, MessageBody};

use crate::{ChatApi, Credentials, NewAccount, ProfileUpdate, UserProfile};

/// Reqwest-backed implementation of [`ChatApi`].
///
/// Cookies are kept across requests so the auth session established by
/// `login`/`signup` rides along on every later call.
pub struct HttpChatApi {
    client: Client,
    base_url: String,
    timeout: Duration,
}

/// Error payloads carry the human-readable reason under `message`,
/// except the message routes which use `error`.
#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

impl HttpChatApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .cookie_store(true)
            .build()
            .map_err(|err| ApiError::Network(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn transport_error(&self, err: reqwest::Error) -> ApiError {
        if err.is_timeout() {
            ApiError::Timeout(self.timeout)
        } else {
            ApiError::Network(err.to_string())
        }
    }

    async fn check_status(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|parsed| parsed.message.or(parsed.error))
            .unwrap_or(body);
        Err(ApiError::from_status(status.as_u16(), message))
    }

    async fn decode<T: DeserializeOwned>(&self, response: Response) -> Result<T, ApiError> {
        let response = Self::check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|err| ApiError::Decode(err.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|err| self.transport_error(err))?;
        self.decode(response).await
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn login(&self, credentials: &Credentials) -> Result<UserProfile, ApiError> {
        let body = serde_json::json!({
            "email": credentials.email,
            "password": credentials.password.expose_secret(),
        });
        let response = self
            .client
            .post(self.url("/auth/login"))
            .json(&body)
            .send()
            .await
            .map_err(|err| self.transport_error(err))?;
        self.decode(response).await
    }

    async fn signup(&self, account: &NewAccount) -> Result<UserProfile, ApiError> {
        let body = serde_json::json!({
            "full_name": account.full_name,
            "email": account.email,
            "password": account.password.expose_secret(),
        });
        let response = self
            .client
            .post(self.url("/auth/signup"))
            .json(&body)
            .send()
            .await
            .map_err(|err| self.transport_error(err))?;
        self.decode(response).await
    }

    async fn logout(&self) -> Result<(), ApiError> {
        let response = self
            .client
            .post(self.url("/auth/logout"))
            .send()
            .await
            .map_err(|err| self.transport_error(err))?;
        Self::check_status(response).await?;
        Ok(())
    }

    async fn check_auth(&self) -> Result<UserProfile, ApiError> {
        self.get_json("/auth/check").await
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile, ApiError> {
        let response = self
            .client
            .put(self.url("/auth/update-profile"))
            .json(update)
            .send()
            .await
            .map_err(|err| self.transport_error(err))?;
        self.decode(response).await
    }

    async fn fetch_peers(&self) -> Result<Vec<UserProfile>, ApiError> {
        self.get_json("/message/users").await
    }

    async fn fetch_history(&self, peer_id: &UserId) -> Result<Vec<ChatMessage>, ApiError> {
        self.get_json(&format!("/message/{peer_id}")).await
    }

    async fn send_message(
        &self,
        peer_id: &UserId,
        body: &MessageBody,
    ) -> Result<ChatMessage, ApiError> {
        let response = self
            .client
            .post(self.url(&format!("/message/send/{peer_id}")))
            .json(body)
            .send()
            .await
            .map_err(|err| self.transport_error(err))?;
        self.decode(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use chatt_core::message::MessageBody;
    use chrono::Utc;

    fn user_json(id: &str, name: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "full_name": name,
            "email": format!("{name}@example.com"),
        })
    }

    fn message_json(id: &str, sender: &str, recipient: &str, text: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "sender_id": sender,
            "recipient_id": recipient,
            "text": text,
            "created_at": Utc::now(),
        })
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });
        format!("http://{addr}")
    }

    fn test_router() -> Router {
        Router::new()
            .route(
                "/auth/login",
                post(|Json(body): Json<serde_json::Value>| async move {
                    if body["password"] == "secret" {
                        (StatusCode::OK, Json(user_json("user_1", "ada")))
                    } else {
                        (
                            StatusCode::UNAUTHORIZED,
                            Json(serde_json::json!({"message": "Invalid credentials"})),
                        )
                    }
                }),
            )
            .route(
                "/message/users",
                get(|| async { Json(vec![user_json("user_2", "grace"), user_json("user_3", "alan")]) }),
            )
            .route(
                "/message/{peer}",
                get(|Path(peer): Path<String>| async move {
                    Json(vec![message_json("msg_1", &peer, "user_1", "hello")])
                }),
            )
            .route(
                "/message/send/{peer}",
                post(|Path(peer): Path<String>, Json(body): Json<serde_json::Value>| async move {
                    match body.get("text").and_then(|t| t.as_str()) {
                        Some(text) => (
                            StatusCode::OK,
                            Json(message_json("msg_2", "user_1", &peer, text)),
                        ),
                        None => (
                            StatusCode::BAD_REQUEST,
                            Json(serde_json::json!({"error": "Message text or image required"})),
                        ),
                    }
                }),
            )
    }

    #[tokio::test]
    async fn login_success() {
        let base = serve(test_router()).await;
        let api = HttpChatApi::new(base, Duration::from_secs(5)).unwrap();

        let user = api
            .login(&Credentials::new("ada@example.com", "secret"))
            .await
            .unwrap();
        assert_eq!(user.id.as_str(), "user_1");
        assert_eq!(user.full_name, "ada");
    }

    #[tokio::test]
    async fn login_failure_surfaces_server_message() {
        let base = serve(test_router()).await;
        let api = HttpChatApi::new(base, Duration::from_secs(5)).unwrap();

        let err = api
            .login(&Credentials::new("ada@example.com", "wrong"))
            .await
            .unwrap_err();
        match err {
            ApiError::Unauthorized(message) => assert_eq!(message, "Invalid credentials"),
            other => panic!("expected Unauthorized, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn fetch_peers_decodes_list() {
        let base = serve(test_router()).await;
        let api = HttpChatApi::new(base, Duration::from_secs(5)).unwrap();

        let peers = api.fetch_peers().await.unwrap();
        assert_eq!(peers.len(), 2);
        assert_eq!(peers[0].full_name, "grace");
    }

    #[tokio::test]
    async fn fetch_history_hits_peer_route() {
        let base = serve(test_router()).await;
        let api = HttpChatApi::new(base, Duration::from_secs(5)).unwrap();

        let peer = UserId::from_raw("user_9");
        let history = api.fetch_history(&peer).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].sender_id, peer);
        assert_eq!(history[0].body.text(), Some("hello"));
    }

    #[tokio::test]
    async fn send_message_returns_stored_message() {
        let base = serve(test_router()).await;
        let api = HttpChatApi::new(base, Duration::from_secs(5)).unwrap();

        let peer = UserId::from_raw("user_9");
        let body = MessageBody::from_text("hi there").unwrap();
        let stored = api.send_message(&peer, &body).await.unwrap();
        assert_eq!(stored.id.as_str(), "msg_2");
        assert_eq!(stored.recipient_id, peer);
        assert_eq!(stored.body.text(), Some("hi there"));
    }

    #[tokio::test]
    async fn error_key_is_also_recognized() {
        let base = serve(test_router()).await;
        let api = HttpChatApi::new(base, Duration::from_secs(5)).unwrap();

        let peer = UserId::from_raw("user_9");
        let body = MessageBody::from_image("data:image/png;base64,AAAA").unwrap();
        let err = api.send_message(&peer, &body).await.unwrap_err();
        match err {
            ApiError::BadRequest(message) => {
                assert_eq!(message, "Message text or image required")
            }
            other => panic!("expected BadRequest, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn connection_refused_is_a_network_error() {
        // Port 9 is discard; nothing listens there in the test environment.
        let api = HttpChatApi::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let err = api.fetch_peers().await.unwrap_err();
        assert!(
            matches!(err, ApiError::Network(_) | ApiError::Timeout(_)),
            "got: {err:?}"
        );
    }
}
