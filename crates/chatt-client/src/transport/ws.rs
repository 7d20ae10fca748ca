use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use chatt_core::errors::ClientError;
use chatt_core::events::ServerEvent;
use chatt_core::ids::UserId;

use crate::config::ReconnectPolicy;
use crate::transport::{LinkEvent, Transport, TransportLink};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const EVENT_QUEUE: usize = 256;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport. Owns the reconnect loop; the link it hands out
/// survives transport drops and brackets them with `Down`/`Up` events.
pub struct WsTransport {
    url: String,
    policy: ReconnectPolicy,
}

impl WsTransport {
    pub fn new(url: impl Into<String>, policy: ReconnectPolicy) -> Self {
        Self {
            url: url.into(),
            policy,
        }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn open(&self, identity: &UserId) -> Result<TransportLink, ClientError> {
        let url = endpoint_url(&self.url, identity);
        let (stream, _) = connect_async(url.as_str())
            .await
            .map_err(|err| ClientError::Transport(err.to_string()))?;

        let (tx, rx) = mpsc::channel(EVENT_QUEUE);
        let cancel = CancellationToken::new();
        tokio::spawn(supervise(stream, url, tx, cancel.clone(), self.policy.clone()));
        Ok(TransportLink::new(rx, cancel))
    }
}

fn endpoint_url(base: &str, identity: &UserId) -> String {
    let sep = if base.contains('?') { '&' } else { '?' };
    format!("{base}{sep}user_id={identity}")
}

/// Pump one socket session after another, reconnecting between them,
/// until cancelled or out of attempts.
async fn supervise(
    stream: WsStream,
    url: String,
    tx: mpsc::Sender<LinkEvent>,
    cancel: CancellationToken,
    policy: ReconnectPolicy,
) {
    let mut stream = stream;
    loop {
        let reason = pump(stream, &tx, &cancel).await;
        if cancel.is_cancelled() {
            let _ = tx.send(LinkEvent::Closed).await;
            return;
        }

        tracing::warn!(reason = %reason, "WebSocket dropped, reconnecting");
        if tx.send(LinkEvent::Down { reason }).await.is_err() {
            return;
        }

        stream = match reconnect(&url, &cancel, &policy).await {
            Some(stream) => stream,
            None => {
                let _ = tx.send(LinkEvent::Closed).await;
                return;
            }
        };
        if tx.send(LinkEvent::Up).await.is_err() {
            return;
        }
    }
}

async fn reconnect(
    url: &str,
    cancel: &CancellationToken,
    policy: &ReconnectPolicy,
) -> Option<WsStream> {
    let mut attempt = 0u32;
    loop {
        if let Some(max) = policy.max_attempts {
            if attempt >= max {
                tracing::warn!(attempts = attempt, "Giving up on reconnection");
                return None;
            }
        }

        let delay = policy.delay(attempt);
        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(delay) => {}
        }

        match connect_async(url).await {
            Ok((stream, _)) => {
                tracing::info!(attempt = attempt + 1, "WebSocket reconnected");
                return Some(stream);
            }
            Err(err) => {
                tracing::warn!(%err, attempt = attempt + 1, "Reconnect attempt failed");
                attempt += 1;
            }
        }
    }
}

/// Run one socket session to completion. Returns the reason it ended.
async fn pump(stream: WsStream, tx: &mpsc::Sender<LinkEvent>, cancel: &CancellationToken) -> String {
    let (mut sink, mut source) = stream.split();
    let mut ping = tokio::time::interval(HEARTBEAT_INTERVAL);
    ping.tick().await; // consume first immediate tick

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                return "cancelled".into();
            }
            _ = ping.tick() => {
                if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                    return "ping failed".into();
                }
            }
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<ServerEvent>(&text) {
                    Ok(event) => {
                        if tx.send(LinkEvent::Event(event)).await.is_err() {
                            return "receiver dropped".into();
                        }
                    }
                    Err(err) => tracing::warn!(%err, "Dropping undecodable frame"),
                },
                Some(Ok(Message::Close(_))) => return "closed by server".into(),
                Some(Ok(_)) => {}
                Some(Err(err)) => return err.to_string(),
                None => return "stream ended".into(),
            }
        }
    }
}
