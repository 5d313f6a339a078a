//! Connection registry
//!
//! Shared map of registered connections, guarded by a single lock. The map
//! itself is private: callers go through `register`, `unregister` and
//! `for_each_except`, none of which hold the lock across an await point.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::peer::Peer;
use crate::types::ConnectionId;

/// Cloneable handle to the shared registry
#[derive(Debug, Clone, Default)]
pub struct Registry {
    peers: Arc<Mutex<HashMap<ConnectionId, Peer>>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a peer, replacing any existing entry for `conn`
    pub fn register(&self, conn: ConnectionId, peer: Peer) {
        self.lock().insert(conn, peer);
    }

    /// Remove `conn` if present
    ///
    /// Returns whether an entry was removed. Removing an unknown connection
    /// is a no-op.
    pub fn unregister(&self, conn: ConnectionId) -> bool {
        self.lock().remove(&conn).is_some()
    }

    /// Visit every registered peer except `exclude`, under the lock
    ///
    /// `f` must not block: it runs with every other registry operation
    /// shut out.
    pub fn for_each_except<F>(&self, exclude: Option<ConnectionId>, mut f: F)
    where
        F: FnMut(ConnectionId, &Peer),
    {
        let peers = self.lock();
        for (conn, peer) in peers.iter() {
            if Some(*conn) != exclude {
                f(*conn, peer);
            }
        }
    }

    /// Whether `conn` is registered
    pub fn contains(&self, conn: ConnectionId) -> bool {
        self.lock().contains_key(&conn)
    }

    /// Number of registered peers
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic elsewhere while holding the lock leaves the map itself intact.
    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, Peer>> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
