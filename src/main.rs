use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::AsyncBufReadExt;
use tokio::sync::broadcast;

use chatt_api::{ChatApi, Credentials, HttpChatApi};
use chatt_client::connection::ConnectionSignal;
use chatt_client::{ChatClient, ClientConfig, WsTransport};
use chatt_core::events::ServerEvent;
use chatt_core::ids::UserId;
use chatt_core::message::{ChatMessage, Draft};

/// Terminal client for a chatt messaging server: logs in, opens one
/// conversation, sends stdin lines, prints pushed messages.
#[derive(Parser)]
#[command(name = "chatt")]
struct Args {
    /// Base URL of the request/response API
    #[arg(long, default_value = "http://localhost:5001/api")]
    api_url: String,

    /// WebSocket endpoint for the live channel
    #[arg(long, default_value = "ws://localhost:5001/ws")]
    ws_url: String,

    #[arg(long)]
    email: String,

    #[arg(long, env = "CHATT_PASSWORD", hide_env_values = true)]
    password: String,

    /// Peer user id to open a conversation with; omit to just list peers
    #[arg(long)]
    peer: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = ClientConfig {
        api_base_url: args.api_url,
        ws_url: args.ws_url,
        ..Default::default()
    };

    let api = Arc::new(
        HttpChatApi::new(config.api_base_url.clone(), config.request_timeout)
            .context("building API client")?,
    ) as Arc<dyn ChatApi>;
    let transport = Arc::new(WsTransport::new(
        config.ws_url.clone(),
        config.reconnect.clone(),
    ));

    let credentials = Credentials::new(args.email, args.password);
    let client = ChatClient::login(api, transport, &config, &credentials)
        .await
        .context("login failed")?;
    tracing::info!(user_id = %client.session().user_id(), "Logged in");

    let peers = client.peers().await.context("fetching peers")?;
    for peer in &peers {
        println!("{}  {} <{}>", peer.id, peer.full_name, peer.email);
    }

    let Some(peer) = args.peer else {
        tracing::info!("No --peer given, nothing to open");
        return Ok(());
    };
    let peer = UserId::from_raw(peer);

    client.conversation().select(Some(peer.clone())).await?;
    for message in client.conversation().messages() {
        print_message(&message);
    }

    // Echo pushed messages for the open conversation as they arrive.
    let mut signals = client.connection().subscribe();
    let printer_peer = peer.clone();
    let printer = tokio::spawn(async move {
        loop {
            match signals.recv().await {
                Ok(ConnectionSignal::Event(ServerEvent::NewMessage { message }))
                    if message.sender_id == printer_peer =>
                {
                    print_message(&message);
                }
                Ok(ConnectionSignal::Reconnecting) => {
                    tracing::warn!("Connection lost, reconnecting");
                }
                Ok(ConnectionSignal::Closed) => break,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Display fell behind, dropped events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => match line? {
                Some(line) if !line.trim().is_empty() => {
                    if let Err(err) = client.conversation().send(Draft::text(line)).await {
                        tracing::error!(error = %err, "Send failed");
                    }
                }
                Some(_) => {}
                None => break,
            }
        }
    }

    printer.abort();
    if let Err(err) = client.logout().await {
        tracing::warn!(error = %err, "Logout failed, closing the channel anyway");
        client.connection().disconnect().await;
    }
    tracing::info!("Shutting down");
    Ok(())
}

fn print_message(message: &ChatMessage) {
    let when = message.created_at.format("%H:%M");
    if let Some(text) = message.body.text() {
        println!("[{when}] {}: {text}", message.sender_id);
    } else if message.body.image().is_some() {
        println!("[{when}] {}: [image]", message.sender_id);
    }
}
