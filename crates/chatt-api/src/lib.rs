use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use chatt_core::errors::ApiError;
use chatt_core::ids::UserId;
use chatt_core::message::{ChatMessage, MessageBody};

pub mod http;
pub mod mock;

pub use http::HttpChatApi;
pub use mock::MockChatApi;

/// A user as the server reports it, both for the authenticated user
/// and for entries in the peer directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub full_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_pic: Option<String>,
}

/// Login credentials. The password never appears in Debug output.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub email: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: SecretString::from(password.into()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct NewAccount {
    pub full_name: String,
    pub email: String,
    pub password: SecretString,
}

/// Profile mutation payload. The picture is a data-URI or URL.
#[derive(Clone, Debug, Serialize)]
pub struct ProfileUpdate {
    pub profile_pic: String,
}

/// The request/response API the synchronizer rides on. All writes go
/// through here; the live channel only ever pushes server events.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<UserProfile, ApiError>;
    async fn signup(&self, account: &NewAccount) -> Result<UserProfile, ApiError>;
    async fn logout(&self) -> Result<(), ApiError>;
    /// Session restore: returns the authenticated user if the stored
    /// credentials are still valid.
    async fn check_auth(&self) -> Result<UserProfile, ApiError>;
    async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile, ApiError>;

    async fn fetch_peers(&self) -> Result<Vec<UserProfile>, ApiError>;
    async fn fetch_history(&self, peer_id: &UserId) -> Result<Vec<ChatMessage>, ApiError>;
    async fn send_message(
        &self,
        peer_id: &UserId,
        body: &MessageBody,
    ) -> Result<ChatMessage, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_debug_redacts_password() {
        let creds = Credentials::new("ada@example.com", "hunter2");
        let debug = format!("{creds:?}");
        assert!(!debug.contains("hunter2"), "got: {debug}");
        assert!(debug.contains("ada@example.com"));
    }

    #[test]
    fn user_profile_serde() {
        let json = r#"{"id":"user_1","full_name":"Ada Lovelace","email":"ada@example.com"}"#;
        let user: UserProfile = serde_json::from_str(json).unwrap();
        assert_eq!(user.full_name, "Ada Lovelace");
        assert!(user.profile_pic.is_none());

        let back = serde_json::to_value(&user).unwrap();
        assert!(back.get("profile_pic").is_none());
    }
}
