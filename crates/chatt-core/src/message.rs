use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ClientError;
use crate::ids::{MessageId, UserId};

/// Payload of a chat message. At least one of text/image is always present;
/// an empty body is unconstructible, including through deserialization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawBody")]
pub struct MessageBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<String>,
}

#[derive(Deserialize)]
struct RawBody {
    text: Option<String>,
    image: Option<String>,
}

impl TryFrom<RawBody> for MessageBody {
    type Error = ClientError;

    fn try_from(raw: RawBody) -> Result<Self, Self::Error> {
        MessageBody::new(raw.text, raw.image)
    }
}

impl MessageBody {
    /// Build a body from optional parts. Whitespace-only text and empty
    /// image strings count as absent.
    pub fn new(text: Option<String>, image: Option<String>) -> Result<Self, ClientError> {
        let text = text
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty());
        let image = image.filter(|i| !i.is_empty());
        if text.is_none() && image.is_none() {
            return Err(ClientError::EmptyMessage);
        }
        Ok(Self { text, image })
    }

    pub fn from_text(text: impl Into<String>) -> Result<Self, ClientError> {
        Self::new(Some(text.into()), None)
    }

    pub fn from_image(image: impl Into<String>) -> Result<Self, ClientError> {
        Self::new(None, Some(image.into()))
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }
}

/// Unvalidated outgoing message parts as collected from the caller.
/// Validation happens on send, before any network call.
#[derive(Clone, Debug, Default)]
pub struct Draft {
    pub text: Option<String>,
    pub image: Option<String>,
}

impl Draft {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            image: None,
        }
    }

    pub fn image(image: impl Into<String>) -> Self {
        Self {
            text: None,
            image: Some(image.into()),
        }
    }

    pub fn into_body(self) -> Result<MessageBody, ClientError> {
        MessageBody::new(self.text, self.image)
    }
}

/// A stored message as the server reports it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub sender_id: UserId,
    pub recipient_id: UserId,
    #[serde(flatten)]
    pub body: MessageBody,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(sender_id: UserId, recipient_id: UserId, body: MessageBody) -> Self {
        Self {
            id: MessageId::new(),
            sender_id,
            recipient_id,
            body,
            created_at: Utc::now(),
        }
    }

    /// The conversation a message belongs to is keyed by whichever side
    /// is not the local user.
    pub fn conversation_peer(&self, me: &UserId) -> &UserId {
        if &self.sender_id == me {
            &self.recipient_id
        } else {
            &self.sender_id
        }
    }
}
