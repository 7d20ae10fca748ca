use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use chatt_core::events::ServerEvent;
use chatt_core::ids::UserId;

use crate::connection::{ConnectionManager, ConnectionSignal};

/// Maintains the set of currently-online peers from server snapshots.
///
/// Each snapshot replaces the set wholesale. Through a `reconnecting`
/// window the last-known set is retained but flagged stale; an explicit
/// close clears it. After a reconnect the set stays stale until the
/// first fresh snapshot arrives.
pub struct PresenceTracker {
    online: Arc<RwLock<HashSet<UserId>>>,
    stale: Arc<AtomicBool>,
    task: tokio::task::JoinHandle<()>,
}

impl PresenceTracker {
    pub fn new(connection: &ConnectionManager) -> Self {
        let online = Arc::new(RwLock::new(HashSet::new()));
        let stale = Arc::new(AtomicBool::new(true));
        let task = tokio::spawn(track(
            connection.subscribe(),
            Arc::clone(&online),
            Arc::clone(&stale),
        ));
        Self { online, stale, task }
    }

    pub fn is_online(&self, user_id: &UserId) -> bool {
        self.online.read().contains(user_id)
    }

    pub fn online(&self) -> HashSet<UserId> {
        self.online.read().clone()
    }

    /// True until the first snapshot on the current channel arrives.
    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Relaxed)
    }
}

impl Drop for PresenceTracker {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn track(
    mut rx: broadcast::Receiver<ConnectionSignal>,
    online: Arc<RwLock<HashSet<UserId>>>,
    stale: Arc<AtomicBool>,
) {
    loop {
        match rx.recv().await {
            Ok(ConnectionSignal::Event(ServerEvent::OnlineUsers { user_ids })) => {
                let fresh: HashSet<UserId> = user_ids.into_iter().collect();
                let count = fresh.len();
                *online.write() = fresh;
                stale.store(false, Ordering::Relaxed);
                tracing::debug!(count, "Presence snapshot applied");
            }
            Ok(ConnectionSignal::Reconnecting) => {
                stale.store(true, Ordering::Relaxed);
            }
            Ok(ConnectionSignal::Closed) => {
                online.write().clear();
                stale.store(true, Ordering::Relaxed);
                tracing::debug!("Presence cleared on close");
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Presence receiver lagged, dropped signals");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::transport::MockTransport;

    fn ids(raw: &[&str]) -> Vec<UserId> {
        raw.iter().map(|r| UserId::from_raw(*r)).collect()
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(25)).await;
    }

    async fn connected() -> (MockTransport, ConnectionManager, PresenceTracker) {
        let transport = MockTransport::new();
        let conn = ConnectionManager::new(Arc::new(transport.clone()), Duration::from_millis(100));
        let presence = PresenceTracker::new(&conn);
        conn.connect(&UserId::from_raw("user_me")).await.unwrap();
        (transport, conn, presence)
    }

    #[tokio::test]
    async fn snapshot_replaces_wholesale() {
        let (transport, _conn, presence) = connected().await;

        transport
            .push(ServerEvent::OnlineUsers { user_ids: ids(&["p1", "p2", "p3"]) })
            .await;
        settle().await;
        assert!(presence.is_online(&UserId::from_raw("p2")));
        assert!(!presence.is_stale());

        transport
            .push(ServerEvent::OnlineUsers { user_ids: ids(&["p1", "p3"]) })
            .await;
        settle().await;
        assert!(!presence.is_online(&UserId::from_raw("p2")));
        assert!(presence.is_online(&UserId::from_raw("p1")));
        assert!(presence.is_online(&UserId::from_raw("p3")));
    }

    #[tokio::test]
    async fn unknown_peer_is_offline() {
        let (_transport, _conn, presence) = connected().await;
        assert!(!presence.is_online(&UserId::from_raw("nobody")));
        assert!(presence.is_stale());
    }

    #[tokio::test]
    async fn reconnecting_retains_but_marks_stale() {
        let (transport, _conn, presence) = connected().await;

        transport
            .push(ServerEvent::OnlineUsers { user_ids: ids(&["p1"]) })
            .await;
        settle().await;
        assert!(!presence.is_stale());

        transport.drop_link().await;
        settle().await;
        // Last-known set survives the gap, flagged stale.
        assert!(presence.is_online(&UserId::from_raw("p1")));
        assert!(presence.is_stale());
    }

    #[tokio::test]
    async fn stale_until_fresh_snapshot_after_reconnect() {
        let (transport, _conn, presence) = connected().await;

        transport
            .push(ServerEvent::OnlineUsers { user_ids: ids(&["p1"]) })
            .await;
        settle().await;

        transport.drop_link().await;
        transport.restore_link().await;
        settle().await;
        // Connected again, but nothing fresh yet.
        assert!(presence.is_stale());

        transport
            .push(ServerEvent::OnlineUsers { user_ids: ids(&["p2"]) })
            .await;
        settle().await;
        assert!(!presence.is_stale());
        assert!(presence.is_online(&UserId::from_raw("p2")));
        assert!(!presence.is_online(&UserId::from_raw("p1")));
    }

    #[tokio::test]
    async fn close_clears_the_set() {
        let (transport, conn, presence) = connected().await;

        transport
            .push(ServerEvent::OnlineUsers { user_ids: ids(&["p1", "p2"]) })
            .await;
        settle().await;
        assert_eq!(presence.online().len(), 2);

        conn.disconnect().await;
        settle().await;
        assert!(presence.online().is_empty());
        assert!(presence.is_stale());
    }
}
