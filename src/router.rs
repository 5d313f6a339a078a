//! Broadcast router
//!
//! The single consumer of the broadcast queue. Every session pushes
//! `OutboundEvent`s into one unbounded channel; the router drains it in
//! order and fans each event out to the registered peers' outboxes.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::DeliveryError;
use crate::message::OutboundEvent;
use crate::registry::Registry;

/// Producer side of the broadcast queue, one clone per session
pub type EventSender = mpsc::UnboundedSender<OutboundEvent>;

/// Per-event delivery counts
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FanOut {
    /// Peers the line was queued for
    pub delivered: usize,
    /// Peers whose writer had already stopped
    pub closed: usize,
}

/// The broadcast router task
pub struct Router {
    registry: Registry,
    receiver: mpsc::UnboundedReceiver<OutboundEvent>,
}

impl Router {
    /// Create the broadcast queue and the router consuming it
    pub fn channel(registry: Registry) -> (EventSender, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (sender, Self { registry, receiver })
    }

    /// Run the router loop
    ///
    /// Delivers events in enqueue order until every sender is dropped.
    pub async fn run(mut self) {
        info!("Broadcast router started");

        while let Some(event) = self.receiver.recv().await {
            let stats = fan_out(&self.registry, &event);
            debug!(
                "Routed {:?}: delivered={} closed={}",
                event.text, stats.delivered, stats.closed
            );
        }

        info!("Broadcast router shutting down");
    }

    #[cfg(test)]
    pub(crate) async fn next_event(&mut self) -> Option<OutboundEvent> {
        self.receiver.recv().await
    }
}

/// Hand one event to every registered peer it is meant for
///
/// Never waits on a peer and never drops a line for a peer that is still
/// writing. A peer whose writer stopped is skipped and left for its session
/// to unregister.
pub fn fan_out(registry: &Registry, event: &OutboundEvent) -> FanOut {
    let line: Arc<str> = Arc::from(event.text.as_str());
    let mut stats = FanOut::default();

    registry.for_each_except(event.exclude, |conn, peer| {
        match peer.deliver(Arc::clone(&line)) {
            Ok(()) => stats.delivered += 1,
            Err(DeliveryError::Closed) => {
                debug!("Writer for {} ({}) already stopped", peer.name, conn);
                stats.closed += 1;
            }
        }
    });

    stats
}
