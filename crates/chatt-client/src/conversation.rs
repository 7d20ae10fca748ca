use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;

use chatt_api::ChatApi;
use chatt_core::errors::ClientError;
use chatt_core::events::ServerEvent;
use chatt_core::ids::UserId;
use chatt_core::message::{ChatMessage, Draft};

use crate::connection::{ConnectionManager, ConnectionSignal};

#[derive(Default)]
struct ConvState {
    selected: Option<UserId>,
    messages: Vec<ChatMessage>,
    /// Bumped on every selection change. Results of work started under an
    /// older generation are discarded instead of applied.
    generation: u64,
}

/// Live-event registration for one peer. Dropping the handle is the only
/// way to stop delivery; the filter task dies with it.
pub struct Subscription {
    peer: UserId,
    task: tokio::task::JoinHandle<()>,
}

impl Subscription {
    fn attach(
        mut rx: broadcast::Receiver<ConnectionSignal>,
        peer: UserId,
        state: Arc<RwLock<ConvState>>,
        generation: u64,
    ) -> Self {
        let task_peer = peer.clone();
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ConnectionSignal::Event(ServerEvent::NewMessage { message })) => {
                        if message.sender_id != task_peer {
                            tracing::trace!(
                                sender = %message.sender_id,
                                "Ignoring message from a peer outside the active conversation"
                            );
                            continue;
                        }
                        let mut st = state.write();
                        if st.generation != generation {
                            continue;
                        }
                        st.messages.push(message);
                    }
                    Ok(ConnectionSignal::Ready) => {
                        tracing::debug!(peer = %task_peer, "Live subscription re-attached after reconnect");
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Subscription receiver lagged, dropped signals");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Self { peer, task }
    }

    pub fn peer(&self) -> &UserId {
        &self.peer
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Keeps the ordered message list of the currently selected conversation
/// in sync: history fetch on selection, live push merge, server-confirmed
/// sends. Messages append in arrival order; nothing is reordered by
/// embedded timestamps.
pub struct ConversationSync {
    api: Arc<dyn ChatApi>,
    connection: Arc<ConnectionManager>,
    state: Arc<RwLock<ConvState>>,
    subscription: Mutex<Option<Subscription>>,
}

impl ConversationSync {
    pub fn new(api: Arc<dyn ChatApi>, connection: Arc<ConnectionManager>) -> Self {
        Self {
            api,
            connection,
            state: Arc::new(RwLock::new(ConvState::default())),
            subscription: Mutex::new(None),
        }
    }

    pub fn selected(&self) -> Option<UserId> {
        self.state.read().selected.clone()
    }

    /// Snapshot of the active conversation, oldest first.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.state.read().messages.clone()
    }

    /// The peer the live subscription currently filters on, if any.
    pub fn subscribed_peer(&self) -> Option<UserId> {
        self.subscription.lock().as_ref().map(|s| s.peer().clone())
    }

    /// Switch the active conversation. The previous subscription is torn
    /// down first; `None` just clears. A history fetch that resolves after
    /// the selection moved on is discarded, not applied.
    pub async fn select(&self, peer: Option<UserId>) -> Result<(), ClientError> {
        self.subscription.lock().take();

        let generation = {
            let mut st = self.state.write();
            st.generation += 1;
            st.selected = peer.clone();
            st.messages.clear();
            st.generation
        };

        let Some(peer) = peer else {
            tracing::debug!("Conversation cleared");
            return Ok(());
        };

        let history = self.api.fetch_history(&peer).await?;
        {
            let mut st = self.state.write();
            if st.generation != generation {
                tracing::debug!(peer = %peer, "Discarding history fetch for a superseded selection");
                return Ok(());
            }
            st.messages = history;
        }

        let sub = Subscription::attach(
            self.connection.subscribe(),
            peer.clone(),
            Arc::clone(&self.state),
            generation,
        );
        if self.state.read().generation == generation {
            *self.subscription.lock() = Some(sub);
            tracing::debug!(peer = %peer, "Conversation selected");
        }
        Ok(())
    }

    /// Send to the selected peer. Validation happens before any network
    /// call; the confirmed message is appended only once the server has
    /// accepted it, and only if the selection hasn't moved meanwhile.
    pub async fn send(&self, draft: Draft) -> Result<ChatMessage, ClientError> {
        let body = draft.into_body()?;
        let (peer, generation) = {
            let st = self.state.read();
            let peer = st.selected.clone().ok_or(ClientError::NoConversation)?;
            (peer, st.generation)
        };

        let message = self.api.send_message(&peer, &body).await?;
        {
            let mut st = self.state.write();
            if st.generation == generation {
                st.messages.push(message.clone());
            } else {
                tracing::debug!(
                    peer = %peer,
                    "Dropping send acknowledgment for a conversation no longer selected"
                );
            }
        }
        Ok(message)
    }
}
