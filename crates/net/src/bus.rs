//! Broadcast bus
//!
//! Fans draft events out to every joined session. Delivery is best effort:
//! a session that falls behind skips ahead and recovers on the next full
//! board or clock update.

use tokio::sync::broadcast;
use tracing::trace;

use draftboard_core::{DraftEvent, Publisher};

/// Events buffered per subscriber before it starts lagging
pub const BUS_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct BroadcastBus {
    tx: broadcast::Sender<DraftEvent>,
}

impl BroadcastBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DraftEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Publisher for BroadcastBus {
    fn publish(&self, event: DraftEvent) {
        // Err only means nobody is connected
        if self.tx.send(event).is_err() {
            trace!("No subscribers for draft event");
        }
    }
}
