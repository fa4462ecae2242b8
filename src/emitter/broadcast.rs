//! Push-based broadcast emitter
//!
//! Fans events out to every subscriber over a tokio broadcast channel. Backs
//! push transports (socket channels) where multiple watchers follow the same
//! stream live. Subscribers that join late miss earlier events; the hot cache
//! covers that gap for reconnecting readers.

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{EmittedEvent, Emitter};

/// Default buffer size for the broadcast channel
pub const BROADCAST_CHANNEL_SIZE: usize = 256;

/// Emitter that pushes events to all current subscribers
#[derive(Clone)]
pub struct BroadcastEmitter {
    tx: broadcast::Sender<EmittedEvent>,
}

impl BroadcastEmitter {
    /// Create a broadcast emitter with the default buffer size
    pub fn new() -> Self {
        Self::with_capacity(BROADCAST_CHANNEL_SIZE)
    }

    /// Create a broadcast emitter with a custom buffer size
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to events from this point forward
    pub fn subscribe(&self) -> broadcast::Receiver<EmittedEvent> {
        self.tx.subscribe()
    }

    /// Number of current subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastEmitter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Emitter for BroadcastEmitter {
    async fn emit(&self, event: EmittedEvent) {
        // No subscribers is not an error; the stream may be watched later
        // through the durable store.
        let _ = self.tx.send(event);
    }
}
