use std::sync::Arc;

use chatt_api::{ChatApi, Credentials, NewAccount, ProfileUpdate, UserProfile};
use chatt_core::errors::ClientError;
use chatt_core::session::Session;

use crate::config::ClientConfig;
use crate::connection::ConnectionManager;
use crate::conversation::ConversationSync;
use crate::presence::PresenceTracker;
use crate::transport::Transport;

/// The owned context tying one authenticated session to its connection,
/// presence view, and active conversation. Everything that needs shared
/// state takes this handle; there is no global store to reach through.
pub struct ChatClient {
    session: Session,
    api: Arc<dyn ChatApi>,
    connection: Arc<ConnectionManager>,
    presence: PresenceTracker,
    conversation: ConversationSync,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient").finish_non_exhaustive()
    }
}

impl ChatClient {
    pub async fn login(
        api: Arc<dyn ChatApi>,
        transport: Arc<dyn Transport>,
        config: &ClientConfig,
        credentials: &Credentials,
    ) -> Result<Self, ClientError> {
        let user = api.login(credentials).await?;
        Ok(Self::start(api, transport, config, user).await)
    }

    pub async fn signup(
        api: Arc<dyn ChatApi>,
        transport: Arc<dyn Transport>,
        config: &ClientConfig,
        account: &NewAccount,
    ) -> Result<Self, ClientError> {
        let user = api.signup(account).await?;
        Ok(Self::start(api, transport, config, user).await)
    }

    /// Resume a session from credentials the API still honors (cookies).
    pub async fn restore(
        api: Arc<dyn ChatApi>,
        transport: Arc<dyn Transport>,
        config: &ClientConfig,
    ) -> Result<Self, ClientError> {
        let user = api.check_auth().await?;
        Ok(Self::start(api, transport, config, user).await)
    }

    async fn start(
        api: Arc<dyn ChatApi>,
        transport: Arc<dyn Transport>,
        config: &ClientConfig,
        user: UserProfile,
    ) -> Self {
        let session = Session::new(user.id);
        let connection = Arc::new(ConnectionManager::new(transport, config.connect_timeout));
        let presence = PresenceTracker::new(&connection);
        let conversation = ConversationSync::new(Arc::clone(&api), Arc::clone(&connection));

        let client = Self {
            session,
            api,
            connection,
            presence,
            conversation,
        };

        // A dead live channel is not fatal to the session; the caller can
        // retry with `connect` and the view self-heals on the next sync.
        if let Err(err) = client.connect().await {
            tracing::warn!(error = %err, "Live channel unavailable, continuing without push events");
        }
        client
    }

    /// (Re)open the live channel for this session. Idempotent.
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.connection.connect(self.session.user_id()).await
    }

    /// End the session server-side, then tear down the live channel.
    pub async fn logout(&self) -> Result<(), ClientError> {
        self.api.logout().await?;
        self.connection.disconnect().await;
        Ok(())
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    pub fn conversation(&self) -> &ConversationSync {
        &self.conversation
    }

    pub async fn peers(&self) -> Result<Vec<UserProfile>, ClientError> {
        Ok(self.api.fetch_peers().await?)
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile, ClientError> {
        Ok(self.api.update_profile(update).await?)
    }
}
