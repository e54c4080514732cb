//! Timer-driven collection and publishing.
//!
//! Each data category runs its own loop on its own ticker. A cycle first looks
//! at the hub: with no subscribers it does nothing at all, so an idle server
//! pays no collection cost. The first tick fires immediately, giving new
//! subscribers data without waiting a full interval.

use std::sync::Arc;
use std::time::Duration;

use pulse_collect::{ContainerSource, SnapshotSource};
use pulse_proto::{LiveUpdate, UpdateKind};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, trace};

use crate::hub::Hub;

/// Default interval between cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Shortest interval any periodic task accepts; shorter values are raised to it.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Result of one collection cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nobody was listening; nothing was collected.
    Skipped,
    /// Collected and published.
    Published {
        /// Subscribers that accepted the update.
        delivered: usize,
    },
}

/// Join handles of the running broadcaster loops.
#[derive(Debug)]
pub struct BroadcasterHandles {
    /// System snapshot loop.
    pub system: JoinHandle<()>,
    /// Container list loop.
    pub docker: JoinHandle<()>,
}

impl BroadcasterHandles {
    /// Wait for both loops to stop.
    pub async fn join(self) {
        let _ = tokio::join!(self.system, self.docker);
    }
}

/// Periodically collects snapshots and publishes them through the hub.
pub struct Broadcaster {
    hub: Arc<Hub>,
    system: Arc<dyn SnapshotSource>,
    containers: Arc<dyn ContainerSource>,
    interval: Duration,
}

impl std::fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcaster")
            .field("interval", &self.interval)
            .field("subscribers", &self.hub.count())
            .finish_non_exhaustive()
    }
}

impl Broadcaster {
    /// Create a broadcaster with the default interval.
    #[must_use]
    pub fn new(
        hub: Arc<Hub>,
        system: Arc<dyn SnapshotSource>,
        containers: Arc<dyn ContainerSource>,
    ) -> Self {
        Self {
            hub,
            system,
            containers,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set the interval between cycles, clamped to at least [`MIN_INTERVAL`].
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(MIN_INTERVAL);
        self
    }

    /// Interval between cycles.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Collect and publish one system snapshot, unless nobody is listening.
    ///
    /// The current subscriber count is stamped into the snapshot.
    pub async fn run_system_cycle(&self) -> CycleOutcome {
        if self.hub.count() == 0 {
            return CycleOutcome::Skipped;
        }

        let snapshot = self.system.collect_snapshot().await;
        let snapshot = snapshot.with_ws_clients(self.hub.count());
        let delivered = self.hub.publish(LiveUpdate::System(snapshot));
        CycleOutcome::Published { delivered }
    }

    /// Collect and publish one container list, unless nobody is listening.
    pub async fn run_docker_cycle(&self) -> CycleOutcome {
        if self.hub.count() == 0 {
            return CycleOutcome::Skipped;
        }

        let containers = self.containers.list_containers().await;
        let delivered = self.hub.publish(LiveUpdate::Docker(containers));
        CycleOutcome::Published { delivered }
    }

    /// Start one loop per category. Both stop when `shutdown` turns `true`
    /// or its sender is dropped.
    pub fn spawn(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> BroadcasterHandles {
        info!(interval_ms = self.interval.as_millis() as u64, "starting broadcaster");

        let system = tokio::spawn(Arc::clone(&self).run_loop(UpdateKind::System, shutdown.clone()));
        let docker = tokio::spawn(self.run_loop(UpdateKind::Docker, shutdown));
        BroadcasterHandles { system, docker }
    }

    async fn run_loop(self: Arc<Self>, kind: UpdateKind, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }

            let started = Instant::now();
            let outcome = if kind == UpdateKind::Docker {
                self.run_docker_cycle().await
            } else {
                self.run_system_cycle().await
            };
            let elapsed = started.elapsed();

            match outcome {
                CycleOutcome::Skipped => trace!(kind = kind.as_str(), "no subscribers, cycle skipped"),
                CycleOutcome::Published { delivered } => {
                    trace!(kind = kind.as_str(), delivered, "cycle published");
                }
            }
            if elapsed > self.interval {
                debug!(
                    kind = kind.as_str(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    interval_ms = self.interval.as_millis() as u64,
                    "collection slower than interval, ticks overlap"
                );
            }
        }

        debug!(kind = kind.as_str(), "broadcaster loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_collect::{FakeContainerSource, FakeSnapshotSource};
    use pulse_proto::{Container, SystemSnapshot};

    struct Fixture {
        hub: Arc<Hub>,
        system: Arc<FakeSnapshotSource>,
        containers: Arc<FakeContainerSource>,
        broadcaster: Arc<Broadcaster>,
    }

    fn fixture() -> Fixture {
        let hub = Arc::new(Hub::new());
        let system = Arc::new(FakeSnapshotSource::new().with_snapshot(SystemSnapshot {
            hostname: "test-host".to_string(),
            ..SystemSnapshot::default()
        }));
        let containers = Arc::new(FakeContainerSource::new().with_container(Container {
            id: "abc".to_string(),
            ..Container::default()
        }));
        let broadcaster = Arc::new(
            Broadcaster::new(
                Arc::clone(&hub),
                Arc::clone(&system) as Arc<dyn SnapshotSource>,
                Arc::clone(&containers) as Arc<dyn ContainerSource>,
            )
            .with_interval(Duration::from_secs(2)),
        );
        Fixture {
            hub,
            system,
            containers,
            broadcaster,
        }
    }

    #[tokio::test]
    async fn test_cycles_skip_without_subscribers() {
        let f = fixture();

        assert_eq!(f.broadcaster.run_system_cycle().await, CycleOutcome::Skipped);
        assert_eq!(f.broadcaster.run_docker_cycle().await, CycleOutcome::Skipped);
        assert_eq!(f.system.calls(), 0);
        assert_eq!(f.containers.calls(), 0);
    }

    #[tokio::test]
    async fn test_system_cycle_embeds_subscriber_count() {
        let f = fixture();
        let mut a = f.hub.subscribe(8);
        let _b = f.hub.subscribe(8);

        let outcome = f.broadcaster.run_system_cycle().await;
        assert_eq!(outcome, CycleOutcome::Published { delivered: 2 });

        match a.try_recv().as_deref() {
            Some(LiveUpdate::System(snapshot)) => {
                assert_eq!(snapshot.ws_clients, 2);
                assert_eq!(snapshot.hostname, "test-host");
            }
            other => panic!("unexpected update: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_docker_cycle_publishes_list() {
        let f = fixture();
        let mut queue = f.hub.subscribe(8);

        f.broadcaster.run_docker_cycle().await;

        match queue.try_recv().as_deref() {
            Some(LiveUpdate::Docker(list)) => assert_eq!(list.len(), 1),
            other => panic!("unexpected update: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_engine_publishes_empty_list() {
        let hub = Arc::new(Hub::new());
        let broadcaster = Broadcaster::new(
            Arc::clone(&hub),
            Arc::new(FakeSnapshotSource::new()),
            Arc::new(FakeContainerSource::unavailable()),
        );
        let mut queue = hub.subscribe(8);

        let outcome = broadcaster.run_docker_cycle().await;

        assert_eq!(outcome, CycleOutcome::Published { delivered: 1 });
        assert!(matches!(queue.try_recv().as_deref(), Some(LiveUpdate::Docker(list)) if list.is_empty()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_loops_never_collect() {
        let f = fixture();
        let (_tx, rx) = watch::channel(false);
        let _handles = Arc::clone(&f.broadcaster).spawn(rx);

        tokio::time::sleep(Duration::from_secs(20)).await;

        assert_eq!(f.system.calls(), 0);
        assert_eq!(f.containers.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_subscriber_triggers_next_tick() {
        let f = fixture();
        let (_tx, rx) = watch::channel(false);
        let _handles = Arc::clone(&f.broadcaster).spawn(rx);

        // Let the immediate first tick pass while idle.
        tokio::time::sleep(Duration::from_millis(500)).await;
        let mut queue = f.hub.subscribe(64);
        assert_eq!(f.system.calls(), 0);

        // Next tick at t=2s.
        tokio::time::sleep(Duration::from_millis(1600)).await;
        assert_eq!(f.system.calls(), 1);
        assert_eq!(f.containers.calls(), 1);

        let mut kinds = Vec::new();
        while let Some(update) = queue.try_recv() {
            kinds.push(update.kind());
        }
        kinds.sort_by_key(|k| k.as_str());
        assert_eq!(kinds, vec![UpdateKind::Docker, UpdateKind::System]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_is_immediate() {
        let f = fixture();
        let _queue = f.hub.subscribe(64);
        let (_tx, rx) = watch::channel(false);
        let _handles = Arc::clone(&f.broadcaster).spawn(rx);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(f.system.calls(), 1);

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(f.system.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_clamped() {
        let f = fixture();
        let broadcaster = Arc::new(
            Broadcaster::new(
                Arc::clone(&f.hub),
                Arc::clone(&f.system) as Arc<dyn SnapshotSource>,
                Arc::clone(&f.containers) as Arc<dyn ContainerSource>,
            )
            .with_interval(Duration::ZERO),
        );
        assert_eq!(broadcaster.interval(), MIN_INTERVAL);

        let (tx, rx) = watch::channel(false);
        let handles = broadcaster.spawn(rx);
        tokio::time::sleep(Duration::from_millis(5)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handles.join())
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_loops() {
        let f = fixture();
        let (tx, rx) = watch::channel(false);
        let handles = Arc::clone(&f.broadcaster).spawn(rx);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handles.join())
            .await
            .unwrap();
    }
}
