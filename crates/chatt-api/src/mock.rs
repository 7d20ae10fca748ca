use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use chatt_core::errors::ApiError;
use chatt_core::ids::UserId;
use chatt_core::message::{ChatMessage, MessageBody};

use crate::{ChatApi, Credentials, NewAccount, ProfileUpdate, UserProfile};

/// Pre-programmed reply for one mock endpoint call.
pub struct Reply<T> {
    result: Result<T, ApiError>,
    delay: Option<Duration>,
}

impl<T> Reply<T> {
    pub fn ok(value: T) -> Self {
        Self {
            result: Ok(value),
            delay: None,
        }
    }

    pub fn err(error: ApiError) -> Self {
        Self {
            result: Err(error),
            delay: None,
        }
    }

    /// Wait a duration before resolving. Used to model slow requests.
    pub fn delayed(delay: Duration, value: T) -> Self {
        Self {
            result: Ok(value),
            delay: Some(delay),
        }
    }
}

struct Endpoint<T> {
    replies: Mutex<VecDeque<Reply<T>>>,
    calls: AtomicUsize,
}

impl<T> Endpoint<T> {
    fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    fn push(&self, reply: Reply<T>) {
        self.replies.lock().push_back(reply);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    async fn take(&self, name: &'static str) -> Result<T, ApiError> {
        let call = self.calls.fetch_add(1, Ordering::Relaxed);
        let reply = self.replies.lock().pop_front();
        let Some(reply) = reply else {
            return Err(ApiError::BadRequest(format!(
                "MockChatApi: no reply configured for {name} call {call}"
            )));
        };
        if let Some(delay) = reply.delay {
            tokio::time::sleep(delay).await;
        }
        reply.result
    }
}

/// Mock API that returns pre-programmed replies in sequence, per endpoint,
/// for deterministic tests without a server.
pub struct MockChatApi {
    login: Endpoint<UserProfile>,
    signup: Endpoint<UserProfile>,
    logout: Endpoint<()>,
    check: Endpoint<UserProfile>,
    profile: Endpoint<UserProfile>,
    peers: Endpoint<Vec<UserProfile>>,
    history: Endpoint<Vec<ChatMessage>>,
    send: Endpoint<ChatMessage>,
}

impl Default for MockChatApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChatApi {
    pub fn new() -> Self {
        Self {
            login: Endpoint::new(),
            signup: Endpoint::new(),
            logout: Endpoint::new(),
            check: Endpoint::new(),
            profile: Endpoint::new(),
            peers: Endpoint::new(),
            history: Endpoint::new(),
            send: Endpoint::new(),
        }
    }

    pub fn push_login(&self, reply: Reply<UserProfile>) {
        self.login.push(reply);
    }

    pub fn push_signup(&self, reply: Reply<UserProfile>) {
        self.signup.push(reply);
    }

    pub fn push_logout(&self, reply: Reply<()>) {
        self.logout.push(reply);
    }

    pub fn push_check(&self, reply: Reply<UserProfile>) {
        self.check.push(reply);
    }

    pub fn push_profile(&self, reply: Reply<UserProfile>) {
        self.profile.push(reply);
    }

    pub fn push_peers(&self, reply: Reply<Vec<UserProfile>>) {
        self.peers.push(reply);
    }

    pub fn push_history(&self, reply: Reply<Vec<ChatMessage>>) {
        self.history.push(reply);
    }

    pub fn push_send(&self, reply: Reply<ChatMessage>) {
        self.send.push(reply);
    }

    pub fn login_calls(&self) -> usize {
        self.login.calls()
    }

    pub fn logout_calls(&self) -> usize {
        self.logout.calls()
    }

    pub fn history_calls(&self) -> usize {
        self.history.calls()
    }

    pub fn send_calls(&self) -> usize {
        self.send.calls()
    }
}

#[async_trait]
impl ChatApi for MockChatApi {
    async fn login(&self, _credentials: &Credentials) -> Result<UserProfile, ApiError> {
        self.login.take("login").await
    }

    async fn signup(&self, _account: &NewAccount) -> Result<UserProfile, ApiError> {
        self.signup.take("signup").await
    }

    async fn logout(&self) -> Result<(), ApiError> {
        self.logout.take("logout").await
    }

    async fn check_auth(&self) -> Result<UserProfile, ApiError> {
        self.check.take("check_auth").await
    }

    async fn update_profile(&self, _update: &ProfileUpdate) -> Result<UserProfile, ApiError> {
        self.profile.take("update_profile").await
    }

    async fn fetch_peers(&self) -> Result<Vec<UserProfile>, ApiError> {
        self.peers.take("fetch_peers").await
    }

    async fn fetch_history(&self, _peer_id: &UserId) -> Result<Vec<ChatMessage>, ApiError> {
        self.history.take("fetch_history").await
    }

    async fn send_message(
        &self,
        _peer_id: &UserId,
        _body: &MessageBody,
    ) -> Result<ChatMessage, ApiError> {
        self.send.take("send_message").await
    }
}
