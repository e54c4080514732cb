//! Subscriber membership and fan-out.
//!
//! The hub is the single authority for which subscribers are live. Every
//! mutation, and every publish, runs under one mutex, so register, unregister
//! and publish are observed in a single total order. Nothing inside the lock
//! awaits: delivery is a `try_send` into each subscriber's own bounded queue,
//! and the socket writes happen later in that subscriber's write pump.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use pulse_proto::LiveUpdate;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use crate::error::{HubError, HubResult};
use crate::subscriber::{subscriber_channel, Subscriber, SubscriberId, SubscriberQueue, UpdateSender};

/// Registry of live subscribers.
#[derive(Debug, Default)]
pub struct Hub {
    subscribers: Mutex<HashMap<SubscriberId, UpdateSender>>,
    max_subscribers: Option<usize>,
}

impl Hub {
    /// Create an empty hub with no subscriber limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty hub that refuses registrations beyond `limit`.
    #[must_use]
    pub fn with_max_subscribers(limit: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            max_subscribers: Some(limit),
        }
    }

    /// Add a subscriber to the active set.
    ///
    /// Registering an id that is already present replaces its queue; the set
    /// never holds duplicates. The limit is not enforced here.
    pub fn register(&self, subscriber: Subscriber) {
        let (id, sender) = subscriber.into_parts();
        let count = {
            let mut subscribers = self.subscribers.lock();
            subscribers.insert(id, sender);
            subscribers.len()
        };
        debug!(subscriber = %id, count, "subscriber registered");
    }

    /// Add a subscriber unless the limit is reached.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::TooManySubscribers`] when the hub is full.
    pub fn try_register(&self, subscriber: Subscriber) -> HubResult<()> {
        let (id, sender) = subscriber.into_parts();
        let count = {
            let mut subscribers = self.subscribers.lock();
            if let Some(limit) = self.max_subscribers {
                if subscribers.len() >= limit && !subscribers.contains_key(&id) {
                    return Err(HubError::TooManySubscribers {
                        current: subscribers.len(),
                        limit,
                    });
                }
            }
            subscribers.insert(id, sender);
            subscribers.len()
        };
        debug!(subscriber = %id, count, "subscriber registered");
        Ok(())
    }

    /// Create a queue with `capacity` and register it.
    pub fn subscribe(&self, capacity: usize) -> SubscriberQueue {
        let (subscriber, queue) = subscriber_channel(capacity);
        self.register(subscriber);
        queue
    }

    /// Create a queue with `capacity` and register it, honouring the limit.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::TooManySubscribers`] when the hub is full.
    pub fn try_subscribe(&self, capacity: usize) -> HubResult<SubscriberQueue> {
        let (subscriber, queue) = subscriber_channel(capacity);
        self.try_register(subscriber)?;
        Ok(queue)
    }

    /// Remove a subscriber and close its queue.
    ///
    /// Returns `false` if it was not registered; calling twice is harmless.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.lock().remove(&id);
        match removed {
            Some(sender) => {
                // Dropping the only sender closes the queue.
                drop(sender);
                debug!(subscriber = %id, "subscriber unregistered");
                true
            }
            None => false,
        }
    }

    /// Deliver an update to every live subscriber.
    ///
    /// A subscriber whose queue is full, or whose receiver is gone, is
    /// unregistered on the spot instead of stalling the others. Returns the
    /// number of subscribers that accepted the update.
    pub fn publish(&self, update: LiveUpdate) -> usize {
        let kind = update.kind();
        let update = Arc::new(update);
        let mut slow = Vec::new();
        let mut gone = Vec::new();

        let delivered = {
            let mut subscribers = self.subscribers.lock();
            let mut delivered = 0;
            for (id, sender) in subscribers.iter() {
                match sender.try_send(Arc::clone(&update)) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => slow.push(*id),
                    Err(TrySendError::Closed(_)) => gone.push(*id),
                }
            }
            for id in slow.iter().chain(gone.iter()) {
                subscribers.remove(id);
            }
            delivered
        };

        for id in &slow {
            warn!(subscriber = %id, kind = kind.as_str(), "subscriber queue full, disconnecting slow consumer");
        }
        for id in &gone {
            debug!(subscriber = %id, "subscriber queue already closed, removed");
        }

        delivered
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Whether a subscriber is currently live.
    #[must_use]
    pub fn is_registered(&self, id: SubscriberId) -> bool {
        self.subscribers.lock().contains_key(&id)
    }

    /// Configured subscriber limit, if any.
    #[must_use]
    pub const fn max_subscribers(&self) -> Option<usize> {
        self.max_subscribers
    }

    /// Unregister everyone, closing every queue. Used on shutdown.
    ///
    /// Write pumps drain what is already queued, send a close frame and exit.
    pub fn close_all(&self) -> usize {
        let drained: Vec<_> = self.subscribers.lock().drain().collect();
        let closed = drained.len();
        drop(drained);
        if closed > 0 {
            info!(count = closed, "closed all subscriber queues");
        }
        closed
    }
}
