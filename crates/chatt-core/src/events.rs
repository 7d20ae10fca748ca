use serde::{Deserialize, Serialize};

use crate::ids::UserId;
use crate::message::ChatMessage;

/// Events the server pushes over the live channel.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Full snapshot of currently-online users. Replaces, never diffs.
    #[serde(rename = "online_users")]
    OnlineUsers { user_ids: Vec<UserId> },

    #[serde(rename = "new_message")]
    NewMessage { message: ChatMessage },
}

impl ServerEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::OnlineUsers { .. } => "online_users",
            Self::NewMessage { .. } => "new_message",
        }
    }
}
