//! Peer struct definition
//!
//! Represents a registered connection: its display name and the sending
//! side of its outbox.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::DeliveryError;

/// Sending side of a peer's outbox
pub type Outbox = mpsc::UnboundedSender<Arc<str>>;

/// Registered peer information
///
/// The registry stores one of these per connection that finished its
/// handshake. It never owns the socket, only the outbox feeding it.
#[derive(Debug)]
pub struct Peer {
    /// Identifier sent by the client during the handshake
    pub name: String,
    /// Router → session writer channel
    outbox: Outbox,
}

impl Peer {
    /// Create a new peer with the given name and outbox
    pub fn new(name: String, outbox: Outbox) -> Self {
        Self { name, outbox }
    }

    /// Queue a line for this peer without waiting
    ///
    /// The outbox never fills up, so a peer that keeps reading sees every
    /// line. Fails only once the peer's writer has stopped.
    pub fn deliver(&self, line: Arc<str>) -> Result<(), DeliveryError> {
        self.outbox.send(line).map_err(|_| DeliveryError::Closed)
    }
}
