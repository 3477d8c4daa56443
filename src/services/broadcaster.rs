//! Event Broadcaster
//!
//! In-memory publish/subscribe hub for live event delivery. Backed by a
//! `tokio::sync::broadcast` channel: publishing never blocks, delivery per
//! subscription follows publish order, and a subscriber that falls more
//! than the channel capacity behind loses the oldest pending envelopes
//! (`RecvError::Lagged`). Reconnecting subscribers recover history by
//! querying the event store; the hub itself keeps no state.

use tokio::sync::broadcast;

use crate::models::event::Envelope;

/// Queue capacity per subscription before the oldest envelope is discarded.
const CHANNEL_CAPACITY: usize = 1024;

/// Publish/subscribe hub for event envelopes.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    sender: broadcast::Sender<Envelope>,
}

impl Broadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Attach a new subscription. Dropping the receiver detaches it.
    pub fn attach(&self) -> broadcast::Receiver<Envelope> {
        self.sender.subscribe()
    }

    /// Publish an envelope to all current subscribers. Callable from any
    /// execution context; a send with no subscribers is not an error.
    pub fn publish(&self, envelope: Envelope) {
        let _ = self.sender.send(envelope);
    }

    /// Number of currently attached subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::event::EventKind;

    fn envelope(id: i64) -> Envelope {
        Envelope {
            id,
            timestamp: 0,
            kind: EventKind::Prompt,
            project_id: None,
            path: None,
            payload: serde_json::json!({"text": "t"}),
        }
    }

    #[tokio::test]
    async fn test_delivery_in_publish_order() {
        let hub = Broadcaster::new();
        let mut rx = hub.attach();
        for id in 1..=3 {
            hub.publish(envelope(id));
        }
        for id in 1..=3 {
            assert_eq!(rx.recv().await.unwrap().id, id);
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let hub = Broadcaster::new();
        hub.publish(envelope(1));
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_independent_subscriptions() {
        let hub = Broadcaster::new();
        let mut a = hub.attach();
        let mut b = hub.attach();
        hub.publish(envelope(7));
        assert_eq!(a.recv().await.unwrap().id, 7);
        assert_eq!(b.recv().await.unwrap().id, 7);
    }
}
