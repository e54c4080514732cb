//! Dashboard server implementation.

use std::future::Future;
use std::sync::Arc;

use pulse_collect::{ContainerSource, DockerSource, HostCollector, NoContainers, SnapshotSource};
use pulse_hub::Broadcaster;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::DashboardConfig;
use crate::error::{DashboardError, DashboardResult};
use crate::routes::create_router;
use crate::state::DashboardState;

/// Dashboard server: the HTTP API plus its background tasks.
///
/// Serving starts the broadcaster and the client liveness sweeper; both stop
/// when the server shuts down.
#[derive(Debug, Clone)]
pub struct DashboardServer {
    state: Arc<DashboardState>,
}

impl DashboardServer {
    /// Create a server around the given collectors.
    #[must_use]
    pub fn new(
        config: DashboardConfig,
        system: Arc<dyn SnapshotSource>,
        containers: Arc<dyn ContainerSource>,
    ) -> Self {
        let state = Arc::new(DashboardState::new(config, system, containers));
        Self { state }
    }

    /// Create a server that collects from this host and its Docker engine.
    ///
    /// Without a reachable engine configuration the container list stays empty.
    #[must_use]
    pub fn with_local_collectors(config: DashboardConfig) -> Self {
        let containers: Arc<dyn ContainerSource> = match DockerSource::connect() {
            Ok(docker) => Arc::new(docker),
            Err(e) => {
                warn!(error = %e, "docker client unavailable, container list disabled");
                Arc::new(NoContainers)
            }
        };
        Self::new(config, Arc::new(HostCollector::new()), containers)
    }

    /// Get the dashboard state for external access.
    #[must_use]
    pub fn state(&self) -> Arc<DashboardState> {
        Arc::clone(&self.state)
    }

    /// Create the router without starting the server.
    pub fn router(&self) -> axum::Router {
        create_router(self.state())
    }

    /// Bind the configured address and serve until a fatal error.
    ///
    /// # Errors
    ///
    /// Returns an error if binding fails or the server stops unexpectedly.
    pub async fn serve(&self) -> DashboardResult<()> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Bind the configured address and serve until `shutdown` completes.
    ///
    /// # Errors
    ///
    /// Returns an error if binding fails or the server stops unexpectedly.
    pub async fn serve_with_shutdown<F>(&self, shutdown: F) -> DashboardResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.state.config().bind_address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| DashboardError::BindFailed(addr, e))?;
        self.serve_listener(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` completes.
    ///
    /// On shutdown every subscriber queue is closed first, so connection
    /// pumps drain, send a close frame and exit.
    ///
    /// # Errors
    ///
    /// Returns an error if the server stops unexpectedly.
    pub async fn serve_listener<F>(&self, listener: TcpListener, shutdown: F) -> DashboardResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener
            .local_addr()
            .map_err(|e| DashboardError::Internal(e.to_string()))?;
        let config = self.state.config();
        info!(addr = %local_addr, "Dashboard server listening");

        let (stop_tx, stop_rx) = watch::channel(false);
        let broadcaster = Arc::new(
            Broadcaster::new(
                Arc::clone(self.state.hub()),
                Arc::clone(self.state.system_source()),
                Arc::clone(self.state.container_source()),
            )
            .with_interval(config.poll_interval()),
        );
        let loops = broadcaster.spawn(stop_rx.clone());
        let sweeper = self.state.clients().spawn_sweeper(
            config.sweep_interval(),
            config.client_stale_after(),
            stop_rx,
        );

        let hub = Arc::clone(self.state.hub());
        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                shutdown.await;
                hub.close_all();
            })
            .await
            .map_err(|e| DashboardError::Internal(e.to_string()));

        let _ = stop_tx.send(true);
        loops.join().await;
        let _ = sweeper.await;

        info!("Dashboard server shut down");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_collect::{FakeContainerSource, FakeSnapshotSource};
    use std::time::Duration;

    fn make_test_server() -> DashboardServer {
        DashboardServer::new(
            DashboardConfig::default().with_host("127.0.0.1").with_port(0),
            Arc::new(FakeSnapshotSource::new()),
            Arc::new(FakeContainerSource::new()),
        )
    }

    #[test]
    fn test_server_clone_shares_state() {
        let server = make_test_server();
        let cloned = server.clone();

        let _queue = server.state().hub().subscribe(4);
        assert_eq!(cloned.state().hub().count(), 1);
    }

    #[tokio::test]
    async fn test_serve_with_shutdown() {
        let server = make_test_server();
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            server
                .serve_with_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = shutdown_tx.send(());

        let result = tokio::time::timeout(Duration::from_secs(2), handle).await;
        assert!(result.unwrap().unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_closes_subscriber_queues() {
        let server = make_test_server();
        let queue = server.state().hub().subscribe(4);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        server.serve_listener(listener, async {}).await.unwrap();

        assert!(queue.is_closed());
        assert_eq!(server.state().hub().count(), 0);
    }

    #[tokio::test]
    async fn test_bind_failure_reported() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();
        let server = DashboardServer::new(
            DashboardConfig::default().with_host("127.0.0.1").with_port(port),
            Arc::new(FakeSnapshotSource::new()),
            Arc::new(FakeContainerSource::new()),
        );

        let err = server.serve().await.unwrap_err();
        assert!(matches!(err, DashboardError::BindFailed(_, _)));
    }
}
