use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::error;

use braid_types::events::ServerEvent;

/// An event serialized once, shared by every subscriber.
#[derive(Debug, Clone)]
pub struct EventFrame {
    pub json: Arc<str>,
}

/// Fans domain events out to every connected client. Broadcast is
/// best-effort and fire-and-forget: there is no history or replay, a client
/// that connects after an event simply never sees it, and a failed delivery
/// never surfaces to the command that emitted the event.
#[derive(Clone)]
pub struct Dispatcher {
    broadcast_tx: broadcast::Sender<EventFrame>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self { broadcast_tx }
    }

    /// Subscribe to the event stream. Dropping the receiver (client
    /// disconnect) removes the subscription.
    pub fn subscribe(&self) -> broadcast::Receiver<EventFrame> {
        self.broadcast_tx.subscribe()
    }

    /// Serialize the event once and hand it to every subscriber.
    pub fn emit(&self, event: &ServerEvent) {
        let json = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize event: {}", e);
                return;
            }
        };
        // A send error just means nobody is connected.
        let _ = self.broadcast_tx.send(EventFrame { json: json.into() });
    }

    pub fn subscriber_count(&self) -> usize {
        self.broadcast_tx.receiver_count()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
