pub mod client;
pub mod config;
pub mod connection;
pub mod conversation;
pub mod presence;
pub mod transport;

pub use client::ChatClient;
pub use config::{ClientConfig, ReconnectPolicy};
pub use connection::{ConnectionManager, ConnectionSignal, ConnectionState};
pub use conversation::{ConversationSync, Subscription};
pub use presence::PresenceTracker;
pub use transport::{MockTransport, Transport, TransportLink, WsTransport};
