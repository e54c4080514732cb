//! Subscriber identity and outbound queues.

use std::fmt;
use std::sync::Arc;

use pulse_proto::LiveUpdate;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Default outbound queue capacity per subscriber.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Unique identifier for a live subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    /// Create a new random `SubscriberId`.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an id from its hyphenated UUID form.
    ///
    /// # Errors
    ///
    /// Returns an error if `s` is not a valid UUID.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }

    /// Get the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sending half of a subscriber queue. Held only by the [`Hub`](crate::Hub).
pub type UpdateSender = mpsc::Sender<Arc<LiveUpdate>>;

/// Handle handed to the hub on registration.
///
/// Registration consumes the handle; the hub owns the only sender, so
/// unregistering closes the queue.
#[derive(Debug)]
pub struct Subscriber {
    id: SubscriberId,
    sender: UpdateSender,
}

impl Subscriber {
    /// This subscriber's id.
    #[must_use]
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    pub(crate) fn into_parts(self) -> (SubscriberId, UpdateSender) {
        (self.id, self.sender)
    }
}

/// Receiving half of a subscriber queue, drained by the write pump.
#[derive(Debug)]
pub struct SubscriberQueue {
    id: SubscriberId,
    receiver: mpsc::Receiver<Arc<LiveUpdate>>,
}

impl SubscriberQueue {
    /// The subscriber this queue belongs to.
    #[must_use]
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next update. `None` once the queue is closed and drained.
    pub async fn recv(&mut self) -> Option<Arc<LiveUpdate>> {
        self.receiver.recv().await
    }

    /// Take the next update if one is already queued.
    pub fn try_recv(&mut self) -> Option<Arc<LiveUpdate>> {
        self.receiver.try_recv().ok()
    }

    /// Whether the hub has closed this queue.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.receiver.is_closed()
    }

    /// Updates waiting to be written.
    #[must_use]
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Whether nothing is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

/// Create a subscriber handle and its queue with the given capacity.
#[must_use]
pub fn subscriber_channel(capacity: usize) -> (Subscriber, SubscriberQueue) {
    let id = SubscriberId::new();
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (Subscriber { id, sender }, SubscriberQueue { id, receiver })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(SubscriberId::new(), SubscriberId::new());
    }

    #[test]
    fn test_id_display_parses_back() {
        let id = SubscriberId::new();
        assert_eq!(SubscriberId::parse(&id.to_string()).unwrap(), id);
        assert!(SubscriberId::parse("not-a-uuid").is_err());
    }

    #[test]
    fn test_id_serializes_as_bare_uuid() {
        let id = SubscriberId::new();
        let json = serde_json::to_value(id).unwrap();
        assert_eq!(json, serde_json::Value::String(id.to_string()));
        assert_eq!(serde_json::from_value::<SubscriberId>(json).unwrap(), id);
    }

    #[test]
    fn test_channel_pairs_share_id() {
        let (subscriber, queue) = subscriber_channel(4);
        assert_eq!(subscriber.id(), queue.id());
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_queue_closes_when_handle_dropped() {
        let (subscriber, mut queue) = subscriber_channel(4);
        drop(subscriber);

        assert!(queue.recv().await.is_none());
        assert!(queue.is_closed());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let (subscriber, _queue) = subscriber_channel(0);
        let (_, sender) = subscriber.into_parts();
        assert_eq!(sender.max_capacity(), 1);
    }
}
