use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use domain::ScaleEvent;
use domain::event::EventPublisher;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error};
use uuid::Uuid;

pub type SubscriberId = Uuid;

/// Receiving end handed to one observer. Dropping it unregisters lazily on the next publish.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<String>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next serialized event, `None` once unsubscribed.
    pub async fn recv(&mut self) -> Option<String> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<String> {
        self.receiver.try_recv().ok()
    }

    pub fn into_receiver(self) -> mpsc::Receiver<String> {
        self.receiver
    }
}

/// Observer registry fanning every event out to all live subscribers.
///
/// Each subscriber owns a bounded queue. A full queue drops that subscriber's copy of the
/// event; a closed one removes the subscriber. Neither affects the others.
pub struct SubscriberBroadcast {
    subscribers: DashMap<SubscriberId, mpsc::Sender<String>>,
    buffer: usize,
    dropped: AtomicU64,
}

impl SubscriberBroadcast {
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: DashMap::new(),
            buffer: buffer.max(1),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = Uuid::new_v4();
        self.subscribers.insert(id, tx);
        debug!(subscriber = %id, "Subscriber registered");
        Subscription { id, receiver: rx }
    }

    /// Returns whether `id` was registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.remove(&id).is_some();
        if removed {
            debug!(subscriber = %id, "Subscriber removed");
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Events skipped because a subscriber's queue was full.
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn deliver(&self, payload: &str) {
        let mut closed = Vec::new();

        for entry in self.subscribers.iter() {
            match entry.value().try_send(payload.to_owned()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    debug!(subscriber = %entry.key(), "Subscriber queue full, event dropped");
                }
                Err(TrySendError::Closed(_)) => closed.push(*entry.key()),
            }
        }

        // Removal after iteration; the shard read locks are released by now
        for id in closed {
            self.unsubscribe(id);
        }
    }
}

impl EventPublisher for SubscriberBroadcast {
    fn publish(&self, event: &ScaleEvent) {
        match serde_json::to_string(event) {
            Ok(payload) => self.deliver(&payload),
            Err(e) => error!(event_type = event.event_type(), error = %e, "Failed to serialize event"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn parse(payload: String) -> Value {
        serde_json::from_str(&payload).unwrap()
    }

    #[tokio::test]
    async fn test_every_subscriber_receives_event() {
        let broadcast = SubscriberBroadcast::new(8);
        let mut a = broadcast.subscribe();
        let mut b = broadcast.subscribe();

        broadcast.publish(&ScaleEvent::error("boom"));

        assert_eq!(parse(a.recv().await.unwrap())["message"], "boom");
        assert_eq!(parse(b.recv().await.unwrap())["type"], "error");
    }

    #[tokio::test]
    async fn test_full_subscriber_does_not_block_others() {
        let broadcast = SubscriberBroadcast::new(1);
        let mut slow = broadcast.subscribe();
        let mut fast = broadcast.subscribe();

        broadcast.publish(&ScaleEvent::connected("COM3"));
        assert!(fast.recv().await.is_some());
        broadcast.publish(&ScaleEvent::disconnected());

        assert_eq!(parse(fast.recv().await.unwrap())["connected"], false);
        assert_eq!(broadcast.dropped_events(), 1);
        // The slow one keeps its first event and stays registered
        assert_eq!(parse(slow.recv().await.unwrap())["connected"], true);
        assert!(slow.try_recv().is_none());
        assert_eq!(broadcast.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_closed_subscriber_is_pruned() {
        let broadcast = SubscriberBroadcast::new(4);
        let gone = broadcast.subscribe();
        let mut alive = broadcast.subscribe();
        drop(gone);

        broadcast.publish(&ScaleEvent::disconnected());

        assert_eq!(broadcast.subscriber_count(), 1);
        assert!(alive.recv().await.is_some());
    }

    #[test]
    fn test_unsubscribe() {
        let broadcast = SubscriberBroadcast::new(4);
        let sub = broadcast.subscribe();
        assert!(broadcast.unsubscribe(sub.id()));
        assert!(!broadcast.unsubscribe(sub.id()));
        assert_eq!(broadcast.subscriber_count(), 0);
    }
}
