//! Line-oriented TCP Chat Relay Library
//!
//! Clients connect over TCP, send an identifier as their first line, and
//! every later line they send is rebroadcast to all other connected
//! clients.
//!
//! # Features
//! - Identifier handshake (first line)
//! - Join and leave notices
//! - Chat rebroadcast without self-echo
//! - Blank-line filtering
//! - Per-client outbox so a slow reader never stalls the others
//!
//! # Architecture
//! - `Registry` is the one piece of shared state, a lock-guarded map
//! - Each connection has a `session` task that registers and publishes
//!   `OutboundEvent`s into an unbounded queue
//! - A single `Router` task drains that queue in order and hands each line
//!   to the recipients' outboxes
//! - Each session's writer task drains its own outbox into the socket
//!
//! # Example
//! ```ignore
//! use chat_relay::{RelayConfig, RelayServer};
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = RelayServer::bind(RelayConfig::default()).await.unwrap();
//!     server.run().await;
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod message;
pub mod peer;
pub mod registry;
pub mod router;
pub mod server;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use client::{run_duplex, ClientExit};
pub use config::RelayConfig;
pub use error::{DeliveryError, RelayError};
pub use message::OutboundEvent;
pub use peer::Peer;
pub use registry::Registry;
pub use router::{EventSender, Router};
pub use server::RelayServer;
pub use session::{handle_connection, SessionContext};
pub use types::ConnectionId;
