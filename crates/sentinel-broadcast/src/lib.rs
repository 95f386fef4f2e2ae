//! Generic pub-sub hub for pushing live events out to dashboard
//! clients over a transport this crate doesn't know about (WebSocket,
//! SSE, whatever `sentinel-server` wires it to).
//!
//! Delivery is best-effort: a subscriber whose channel is full or
//! closed is silently skipped on that broadcast. Subscribers are only
//! ever removed when their transport disconnects and calls
//! [`BroadcastHub::unsubscribe`] — a failed send on its own never
//! removes anyone, since a transient backpressure blip shouldn't
//! unregister a live client.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Opaque subscriber handle, unique per call to [`BroadcastHub::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

pub struct BroadcastHub {
    subscribers: DashMap<SubscriberId, UnboundedSender<Arc<str>>>,
    next_id: AtomicU64,
}

impl BroadcastHub {
    pub fn new() -> Self {
        BroadcastHub {
            subscribers: DashMap::new(),
            next_id: AtomicU64::new(0),
        }
    }

    /// Registers a new subscriber and returns the receiving half of
    /// its channel; the caller (typically a WebSocket send loop) pulls
    /// pre-serialized JSON strings from it.
    pub fn subscribe(&self) -> (SubscriberId, UnboundedReceiver<Arc<str>>) {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.insert(id, tx);
        tracing::debug!(subscriber_count = self.subscribers.len(), "subscriber connected");
        (id, rx)
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.subscribers.remove(&id);
        tracing::debug!(subscriber_count = self.subscribers.len(), "subscriber disconnected");
    }

    /// Serializes `payload` once and fans it out to every subscriber
    /// connected at the moment the snapshot is taken. Subscribers that
    /// join after the snapshot miss this message; that's acceptable
    /// for a live dashboard feed.
    pub fn broadcast<T: Serialize>(&self, payload: &T) {
        let json = match serde_json::to_string(payload) {
            Ok(s) => Arc::<str>::from(s),
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize broadcast payload");
                return;
            }
        };

        let snapshot: Vec<UnboundedSender<Arc<str>>> =
            self.subscribers.iter().map(|entry| entry.value().clone()).collect();

        for sender in snapshot {
            if sender.send(json.clone()).is_err() {
                tracing::debug!("dropped broadcast to a subscriber whose channel is gone");
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn subscriber_receives_broadcast_payload() {
        let hub = BroadcastHub::new();
        let (_id, mut rx) = hub.subscribe();
        hub.broadcast(&json!({"type": "threat_detected", "threat_id": "abc"}));
        let msg = rx.recv().await.expect("message delivered");
        assert!(msg.contains("threat_detected"));
    }

    #[tokio::test]
    async fn unsubscribed_clients_do_not_receive_further_broadcasts() {
        let hub = BroadcastHub::new();
        let (id, mut rx) = hub.subscribe();
        hub.unsubscribe(id);
        hub.broadcast(&json!({"type": "ping"}));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn broadcast_reaches_all_current_subscribers() {
        let hub = BroadcastHub::new();
        let (_id1, mut rx1) = hub.subscribe();
        let (_id2, mut rx2) = hub.subscribe();
        hub.broadcast(&json!({"type": "ping"}));
        assert!(rx1.recv().await.is_some());
        assert!(rx2.recv().await.is_some());
    }
}
