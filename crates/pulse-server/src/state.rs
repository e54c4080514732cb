//! Shared state for the dashboard server.

use std::sync::Arc;
use std::time::Instant;

use pulse_collect::{ContainerSource, SnapshotSource};
use pulse_hub::{ConnectionConfig, Hub, RemoteClientRegistry, ServerRegistry};
use pulse_proto::SystemSnapshot;

use crate::config::DashboardConfig;

/// State shared by every handler and background task.
///
/// The hub and both registries are constructed here once and handed out by
/// reference; nothing is process-global.
pub struct DashboardState {
    config: DashboardConfig,
    hub: Arc<Hub>,
    clients: Arc<RemoteClientRegistry>,
    servers: Arc<ServerRegistry>,
    system: Arc<dyn SnapshotSource>,
    containers: Arc<dyn ContainerSource>,
    start_time: Instant,
}

impl std::fmt::Debug for DashboardState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardState")
            .field("config", &self.config)
            .field("subscribers", &self.hub.count())
            .field("clients", &self.clients.len())
            .field("servers", &self.servers.len())
            .finish_non_exhaustive()
    }
}

impl DashboardState {
    /// Create state around the given collectors.
    pub fn new(
        config: DashboardConfig,
        system: Arc<dyn SnapshotSource>,
        containers: Arc<dyn ContainerSource>,
    ) -> Self {
        let hub = Arc::new(Hub::with_max_subscribers(config.max_ws_connections));
        let clients = Arc::new(RemoteClientRegistry::with_hub(Arc::clone(&hub)));
        let servers =
            Arc::new(ServerRegistry::new(config.port).with_probe_timeout(config.probe_timeout()));
        Self {
            config,
            hub,
            clients,
            servers,
            system,
            containers,
            start_time: Instant::now(),
        }
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// Per-subscriber connection settings.
    #[must_use]
    pub fn connection_config(&self) -> ConnectionConfig {
        self.config.connection_config()
    }

    /// The subscriber hub.
    #[must_use]
    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Registry of pushing agents.
    #[must_use]
    pub fn clients(&self) -> &Arc<RemoteClientRegistry> {
        &self.clients
    }

    /// Registry of managed peers.
    #[must_use]
    pub fn servers(&self) -> &Arc<ServerRegistry> {
        &self.servers
    }

    /// Local snapshot collector.
    #[must_use]
    pub fn system_source(&self) -> &Arc<dyn SnapshotSource> {
        &self.system
    }

    /// Container engine.
    #[must_use]
    pub fn container_source(&self) -> &Arc<dyn ContainerSource> {
        &self.containers
    }

    /// Collect a snapshot now, stamped with the current subscriber count.
    pub async fn snapshot(&self) -> SystemSnapshot {
        self.system
            .collect_snapshot()
            .await
            .with_ws_clients(self.hub.count())
    }

    /// Seconds since the state was created.
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_collect::{FakeContainerSource, FakeSnapshotSource};
    use pulse_proto::LOCAL_SERVER_ID;

    fn make_test_state() -> DashboardState {
        DashboardState::new(
            DashboardConfig::default().with_port(8123).with_max_ws_connections(2),
            Arc::new(FakeSnapshotSource::new()),
            Arc::new(FakeContainerSource::new()),
        )
    }

    #[test]
    fn test_registries_wired_from_config() {
        let state = make_test_state();

        assert_eq!(state.hub().max_subscribers(), Some(2));
        assert_eq!(state.servers().get_by_id(LOCAL_SERVER_ID).unwrap().port, 8123);
        assert!(state.clients().is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_carries_subscriber_count() {
        let state = make_test_state();
        let _queue = state.hub().subscribe(4);

        let snapshot = state.snapshot().await;
        assert_eq!(snapshot.ws_clients, 1);
    }

    #[tokio::test]
    async fn test_client_push_reaches_hub() {
        let state = make_test_state();
        let mut queue = state.hub().subscribe(4);

        state
            .clients()
            .upsert("agent", "box", "linux", SystemSnapshot::default())
            .unwrap();

        assert!(queue.try_recv().is_some());
    }
}
