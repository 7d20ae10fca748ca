use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use chatt_core::errors::ClientError;
use chatt_core::events::ServerEvent;
use chatt_core::ids::UserId;

use crate::transport::{LinkEvent, Transport, TransportLink};

/// In-memory transport driven by the test harness: tests play the server
/// side of the wire by pushing link events at the current link.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<MockInner>,
}

#[derive(Default)]
struct MockInner {
    opens: AtomicUsize,
    open_delay: Mutex<Option<Duration>>,
    fail_next: Mutex<Option<String>>,
    current: Mutex<Option<mpsc::Sender<LinkEvent>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_count(&self) -> usize {
        self.inner.opens.load(Ordering::Relaxed)
    }

    /// Make the next `open` sleep first, to model a slow handshake.
    pub fn delay_next_open(&self, delay: Duration) {
        *self.inner.open_delay.lock() = Some(delay);
    }

    /// Make the next `open` fail with the given reason.
    pub fn fail_next_open(&self, reason: impl Into<String>) {
        *self.inner.fail_next.lock() = Some(reason.into());
    }

    fn sender(&self) -> Option<mpsc::Sender<LinkEvent>> {
        self.inner.current.lock().clone()
    }

    /// Push a server event down the current link.
    pub async fn push(&self, event: ServerEvent) {
        if let Some(tx) = self.sender() {
            let _ = tx.send(LinkEvent::Event(event)).await;
        }
    }

    /// Simulate a transport-level drop (the transport keeps retrying).
    pub async fn drop_link(&self) {
        if let Some(tx) = self.sender() {
            let _ = tx
                .send(LinkEvent::Down {
                    reason: "simulated drop".into(),
                })
                .await;
        }
    }

    /// Simulate the transport's reconnect succeeding.
    pub async fn restore_link(&self) {
        if let Some(tx) = self.sender() {
            let _ = tx.send(LinkEvent::Up).await;
        }
    }

    /// Simulate the transport giving up for good.
    pub async fn close_link(&self) {
        if let Some(tx) = self.sender() {
            let _ = tx.send(LinkEvent::Closed).await;
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&self, _identity: &UserId) -> Result<TransportLink, ClientError> {
        let open_delay = self.inner.open_delay.lock().take();
        if let Some(delay) = open_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = self.inner.fail_next.lock().take() {
            return Err(ClientError::Transport(reason));
        }

        self.inner.opens.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(64);
        *self.inner.current.lock() = Some(tx);
        Ok(TransportLink::new(rx, CancellationToken::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pushes_reach_the_link() {
        let transport = MockTransport::new();
        let mut link = transport.open(&UserId::from_raw("user_me")).await.unwrap();

        transport
            .push(ServerEvent::OnlineUsers { user_ids: vec![] })
            .await;
        assert!(matches!(
            link.recv().await,
            Some(LinkEvent::Event(ServerEvent::OnlineUsers { .. }))
        ));
        assert_eq!(transport.open_count(), 1);
    }

    #[tokio::test]
    async fn cancelled_link_stops_receiving() {
        let transport = MockTransport::new();
        let mut link = transport.open(&UserId::from_raw("user_me")).await.unwrap();

        link.close();
        assert!(link.recv().await.is_none());
    }

    #[tokio::test]
    async fn failed_open_is_an_error() {
        let transport = MockTransport::new();
        transport.fail_next_open("connection refused");

        let err = transport
            .open(&UserId::from_raw("user_me"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
        assert_eq!(transport.open_count(), 0);
    }
}
