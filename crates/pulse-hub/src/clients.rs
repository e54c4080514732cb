//! Registry of remote agents that push their own metrics.
//!
//! Pushes and liveness sweeps both take the write lock for their whole
//! check-and-mutate step. A push is therefore ordered either entirely before a
//! sweep (its fresh `last_seen` keeps it online) or entirely after it (it
//! forces the entry back online), so the newest information always wins.
//!
//! The client update is published before the write lock is released.
//! [`Hub::publish`] only enqueues, so this never blocks, and subscribers see
//! pushes for one id in the same order the registry applied them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use pulse_proto::{ClientStatus, ClientUpdate, LiveUpdate, RemoteClient, SystemSnapshot};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::broadcaster::MIN_INTERVAL;
use crate::error::{HubError, HubResult};
use crate::hub::Hub;

/// Default age after which a silent agent is marked offline.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(30);

/// Whether a push created a new entry or refreshed an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// First push from this id.
    Created,
    /// Existing entry refreshed.
    Updated,
}

/// Remote agents keyed by their self-assigned id.
#[derive(Debug, Default)]
pub struct RemoteClientRegistry {
    clients: RwLock<HashMap<String, RemoteClient>>,
    hub: Option<Arc<Hub>>,
}

impl RemoteClientRegistry {
    /// Create an empty registry that publishes nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry that publishes every push through `hub`.
    #[must_use]
    pub fn with_hub(hub: Arc<Hub>) -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            hub: Some(hub),
        }
    }

    /// Record a push received now.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::InvalidClientId`] if `id` is blank.
    pub fn upsert(
        &self,
        id: &str,
        hostname: &str,
        platform: &str,
        metrics: SystemSnapshot,
    ) -> HubResult<UpsertOutcome> {
        self.upsert_at(id, hostname, platform, metrics, Utc::now())
    }

    /// Record a push received at `now`.
    ///
    /// Metrics are replaced wholesale, `last_seen` refreshed and the status
    /// forced online. The client update is published while the lock is held.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::InvalidClientId`] if `id` is blank.
    pub fn upsert_at(
        &self,
        id: &str,
        hostname: &str,
        platform: &str,
        metrics: SystemSnapshot,
        now: DateTime<Utc>,
    ) -> HubResult<UpsertOutcome> {
        if id.trim().is_empty() {
            return Err(HubError::InvalidClientId(id.to_string()));
        }

        let update = self.hub.as_ref().map(|_| ClientUpdate {
            server_id: id.to_string(),
            metrics: metrics.clone(),
        });

        let outcome = {
            let mut clients = self.clients.write();
            let outcome = match clients.get_mut(id) {
                Some(client) => {
                    client.hostname = hostname.to_string();
                    client.platform = platform.to_string();
                    client.metrics = Some(metrics);
                    client.last_seen = now;
                    client.status = ClientStatus::Online;
                    UpsertOutcome::Updated
                }
                None => {
                    clients.insert(
                        id.to_string(),
                        RemoteClient {
                            id: id.to_string(),
                            hostname: hostname.to_string(),
                            platform: platform.to_string(),
                            status: ClientStatus::Online,
                            last_seen: now,
                            metrics: Some(metrics),
                        },
                    );
                    UpsertOutcome::Created
                }
            };
            if let (Some(hub), Some(update)) = (&self.hub, update) {
                hub.publish(LiveUpdate::Client(update));
            }
            outcome
        };

        match outcome {
            UpsertOutcome::Created => info!(client = id, hostname, platform, "remote client registered"),
            UpsertOutcome::Updated => debug!(client = id, "remote client metrics updated"),
        }

        Ok(outcome)
    }

    /// Mark online clients silent for longer than `threshold` as offline.
    pub fn sweep_stale(&self, threshold: Duration) -> Vec<String> {
        self.sweep_stale_at(Utc::now(), threshold)
    }

    /// Mark online clients with `now - last_seen > threshold` as offline.
    ///
    /// Returns the ids that changed state, sorted.
    pub fn sweep_stale_at(&self, now: DateTime<Utc>, threshold: Duration) -> Vec<String> {
        let mut changed: Vec<String> = {
            let mut clients = self.clients.write();
            clients
                .values_mut()
                .filter(|c| c.status == ClientStatus::Online && is_stale(c.last_seen, now, threshold))
                .map(|c| {
                    c.status = ClientStatus::Offline;
                    c.id.clone()
                })
                .collect()
        };
        changed.sort();
        changed
    }

    /// Remove a client. Returns `false` if it was unknown.
    pub fn delete(&self, id: &str) -> bool {
        let removed = self.clients.write().remove(id).is_some();
        if removed {
            info!(client = id, "remote client deleted");
        }
        removed
    }

    /// Copy of one client.
    #[must_use]
    pub fn get_by_id(&self, id: &str) -> Option<RemoteClient> {
        self.clients.read().get(id).cloned()
    }

    /// Copies of all clients, ordered by id.
    #[must_use]
    pub fn get_all(&self) -> Vec<RemoteClient> {
        let mut clients: Vec<RemoteClient> = self.clients.read().values().cloned().collect();
        clients.sort_by(|a, b| a.id.cmp(&b.id));
        clients
    }

    /// Number of known clients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    /// Whether no client is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }

    /// Number of clients currently online.
    #[must_use]
    pub fn online_count(&self) -> usize {
        self.clients.read().values().filter(|c| c.is_online()).count()
    }

    /// Sweep every `every` until `shutdown` turns `true` or its sender is dropped.
    ///
    /// `every` is clamped to at least [`MIN_INTERVAL`].
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        every: Duration,
        threshold: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(every.max(MIN_INTERVAL));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                if *shutdown.borrow() {
                    break;
                }
                tokio::select! {
                    _ = ticker.tick() => {
                        for id in registry.sweep_stale(threshold) {
                            info!(client = %id, "remote client went offline");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
            debug!("client sweeper stopped");
        })
    }
}

fn is_stale(last_seen: DateTime<Utc>, now: DateTime<Utc>, threshold: Duration) -> bool {
    // A last_seen in the future is not stale.
    (now - last_seen).to_std().is_ok_and(|age| age > threshold)
}
