use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use chatt_core::errors::ClientError;
use chatt_core::events::ServerEvent;
use chatt_core::ids::UserId;

use crate::transport::{LinkEvent, Transport, TransportLink};

const SIGNAL_QUEUE: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
        }
    }
}

/// Signals fanned out to everything riding the connection. `Ready` fires
/// on every `connected` transition, including after a reconnect, and is
/// the cue to re-attach: a reconnect invalidates whatever subscription
/// state the server held for the previous channel.
#[derive(Clone, Debug)]
pub enum ConnectionSignal {
    Ready,
    Reconnecting,
    Closed,
    Event(ServerEvent),
}

/// Owns the lifecycle of the one live channel per session.
pub struct ConnectionManager {
    transport: Arc<dyn Transport>,
    connect_timeout: Duration,
    state: Arc<RwLock<ConnectionState>>,
    signals: broadcast::Sender<ConnectionSignal>,
    live: Mutex<Option<LiveLink>>,
}

struct LiveLink {
    cancel: CancellationToken,
    driver: tokio::task::JoinHandle<()>,
}

impl ConnectionManager {
    pub fn new(transport: Arc<dyn Transport>, connect_timeout: Duration) -> Self {
        let (signals, _) = broadcast::channel(SIGNAL_QUEUE);
        Self {
            transport,
            connect_timeout,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            signals,
            live: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionSignal> {
        self.signals.subscribe()
    }

    /// Open the channel for `identity`. No-op when one is already live;
    /// a connect that outlives the timeout fails without leaving a
    /// half-open channel behind.
    pub async fn connect(&self, identity: &UserId) -> Result<(), ClientError> {
        {
            let mut state = self.state.write();
            match *state {
                ConnectionState::Disconnected => *state = ConnectionState::Connecting,
                current => {
                    tracing::debug!(state = current.as_str(), "Connect skipped, channel already live");
                    return Ok(());
                }
            }
        }

        if let Some(old) = self.live.lock().take() {
            old.cancel.cancel();
        }

        let opened = tokio::time::timeout(self.connect_timeout, self.transport.open(identity)).await;
        let link = match opened {
            Ok(Ok(link)) => link,
            Ok(Err(err)) => {
                *self.state.write() = ConnectionState::Disconnected;
                tracing::warn!(error = %err, "Connection failed");
                return Err(err);
            }
            Err(_) => {
                *self.state.write() = ConnectionState::Disconnected;
                tracing::warn!(timeout = ?self.connect_timeout, "Connection attempt timed out");
                return Err(ClientError::ConnectTimeout(self.connect_timeout));
            }
        };

        let cancel = link.cancel_token();
        let driver = tokio::spawn(drive(
            link,
            Arc::clone(&self.state),
            self.signals.clone(),
        ));
        *self.live.lock() = Some(LiveLink { cancel, driver });

        *self.state.write() = ConnectionState::Connected;
        let _ = self.signals.send(ConnectionSignal::Ready);
        tracing::info!(user_id = %identity, "Connection established");
        Ok(())
    }

    /// Close and release the live channel; no-op when there is none.
    pub async fn disconnect(&self) {
        let live = self.live.lock().take();
        match live {
            Some(live) => {
                live.cancel.cancel();
                let _ = live.driver.await;
            }
            None => tracing::debug!("Disconnect skipped, no live connection"),
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(live) = self.live.lock().take() {
            live.cancel.cancel();
            live.driver.abort();
        }
    }
}

/// Pump link events into state transitions and fan-out signals.
/// Runs until the link closes, then settles on `disconnected`.
async fn drive(
    mut link: TransportLink,
    state: Arc<RwLock<ConnectionState>>,
    signals: broadcast::Sender<ConnectionSignal>,
) {
    while let Some(event) = link.recv().await {
        match event {
            LinkEvent::Up => {
                *state.write() = ConnectionState::Connected;
                let _ = signals.send(ConnectionSignal::Ready);
                tracing::info!("Connection re-established");
            }
            LinkEvent::Down { reason } => {
                *state.write() = ConnectionState::Reconnecting;
                let _ = signals.send(ConnectionSignal::Reconnecting);
                tracing::warn!(reason = %reason, "Connection dropped, transport is retrying");
            }
            LinkEvent::Event(event) => {
                if *state.read() == ConnectionState::Connected {
                    let _ = signals.send(ConnectionSignal::Event(event));
                } else {
                    tracing::debug!(
                        event = event.event_type(),
                        "Dropping event received while not connected"
                    );
                }
            }
            LinkEvent::Closed => break,
        }
    }

    *state.write() = ConnectionState::Disconnected;
    let _ = signals.send(ConnectionSignal::Closed);
    tracing::info!("Connection closed");
}
