//! Broadcast channel for lifecycle events.
//!
//! Observers (CLI renderer, tests) subscribe; the machine emits. Lagging
//! or absent subscribers never block the machine — `send` on a channel
//! with no receivers is simply dropped.

use tokio::sync::broadcast;
use tracing::trace;

use concierge_core::events::AgentEvent;

/// Default channel capacity.
const CHANNEL_CAPACITY: usize = 256;

/// Cloneable event broadcaster.
#[derive(Clone)]
pub struct EventEmitter {
    sender: broadcast::Sender<AgentEvent>,
}

impl EventEmitter {
    /// Create an emitter with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Subscribe to all future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.sender.subscribe()
    }

    /// Emit an event to all current subscribers.
    pub fn emit(&self, event: AgentEvent) {
        trace!(event_type = event.event_type(), "emitting event");
        let _ = self.sender.send(event);
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
