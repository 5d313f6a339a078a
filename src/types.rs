//! Basic type definitions for the relay
//!
//! `ConnectionId` is how the registry, the router and outbound events name
//! a connection without touching its socket.

use uuid::Uuid;

/// Registry key for one accepted connection
///
/// Minted by the session right after accept. The session keeps the only
/// handle to the socket; the registry entry and the `exclude` field of an
/// `OutboundEvent` carry just this id. Ids are never reused, so removing a
/// connection that already left is harmless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short form keeps log lines readable.
        write!(f, "conn-{}", self.0.simple())
    }
}
