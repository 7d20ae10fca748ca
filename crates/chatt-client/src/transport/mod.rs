use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use chatt_core::errors::ClientError;
use chatt_core::events::ServerEvent;
use chatt_core::ids::UserId;

pub mod mock;
pub mod ws;

pub use mock::MockTransport;
pub use ws::WsTransport;

/// Events surfaced by an open link. The transport handles its own
/// reconnection; `Down`/`Up` bracket the gaps it is papering over.
#[derive(Clone, Debug)]
pub enum LinkEvent {
    /// Channel re-established after a drop. Not emitted for the initial
    /// connect (`Transport::open` resolving is that signal).
    Up,
    /// Transport-level drop; the transport is retrying in the background.
    Down { reason: String },
    Event(ServerEvent),
    /// Terminal: the transport gave up or was shut down.
    Closed,
}

/// Handle to one open channel. Dropping the receiver or cancelling the
/// token tears the link down.
#[derive(Debug)]
pub struct TransportLink {
    events: mpsc::Receiver<LinkEvent>,
    cancel: CancellationToken,
}

impl TransportLink {
    pub fn new(events: mpsc::Receiver<LinkEvent>, cancel: CancellationToken) -> Self {
        Self { events, cancel }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Next link event; `None` once the link is cancelled or the
    /// transport side has gone away.
    pub async fn recv(&mut self) -> Option<LinkEvent> {
        tokio::select! {
            _ = self.cancel.cancelled() => None,
            event = self.events.recv() => event,
        }
    }

    pub fn close(&self) {
        self.cancel.cancel();
    }
}

/// The live channel seam. `open` carries the user's identity as the
/// correlation token the server uses to scope pushed events.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, identity: &UserId) -> Result<TransportLink, ClientError>;
}
