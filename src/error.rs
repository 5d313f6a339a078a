//! Error types for the chat relay
//!
//! Defines relay-level errors and per-peer delivery errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Relay-level errors
///
/// Startup errors (bind, config) are fatal to the server. Everything else is
/// local to the session or client task that hit it.
#[derive(Debug, Error)]
pub enum RelayError {
    /// IO error on a connection
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Listener could not bind (fatal at startup)
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Client could not reach the server (fatal to the client)
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The broadcast router is gone
    #[error("broadcast router closed")]
    RouterClosed,

    /// A write to a peer did not complete in time
    #[error("write timed out")]
    WriteTimeout,

    /// Configuration value could not be used
    #[error("invalid value {value:?} for {key}")]
    InvalidConfig { key: &'static str, value: String },
}

/// Outbox hand-off errors
///
/// Returned when the router cannot queue a line for one peer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// The peer's writer has gone away
    #[error("outbox closed")]
    Closed,
}
