//! Registry of operator-configured dashboard peers.
//!
//! Status changes only when a probe runs. The address is copied out under the
//! read lock, the TCP connect happens with no lock held, and the result is
//! written back afterwards. A peer deleted mid-probe simply has nothing to
//! write back to.

use std::collections::HashMap;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::RwLock;
use pulse_proto::{ManagedServer, ServerSpec, ServerStatus, LOCAL_SERVER_ID};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{HubError, HubResult};

/// Default TCP probe timeout.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Managed servers keyed by id, always containing the local entry.
#[derive(Debug)]
pub struct ServerRegistry {
    servers: RwLock<HashMap<String, ManagedServer>>,
    probe_timeout: Duration,
}

impl ServerRegistry {
    /// Create a registry seeded with the local entry on `local_port`.
    #[must_use]
    pub fn new(local_port: u16) -> Self {
        let local = ManagedServer {
            id: LOCAL_SERVER_ID.to_string(),
            name: "Localhost".to_string(),
            host: "localhost".to_string(),
            port: local_port,
            status: ServerStatus::Online,
        };
        let mut servers = HashMap::new();
        servers.insert(local.id.clone(), local);
        Self {
            servers: RwLock::new(servers),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Set the TCP probe timeout.
    #[must_use]
    pub const fn with_probe_timeout(mut self, probe_timeout: Duration) -> Self {
        self.probe_timeout = probe_timeout;
        self
    }

    /// Add a server. It starts offline until probed.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::InvalidServer`] if the spec fails validation.
    pub fn add(&self, spec: ServerSpec) -> HubResult<ManagedServer> {
        spec.validate().map_err(|e| HubError::InvalidServer(e.to_string()))?;

        let server = ManagedServer {
            id: format!("srv-{}", Uuid::new_v4().simple()),
            name: spec.name,
            host: spec.host,
            port: spec.port,
            status: ServerStatus::Offline,
        };
        self.servers.write().insert(server.id.clone(), server.clone());
        info!(server = %server.id, address = %server.address(), "managed server added");
        Ok(server)
    }

    /// Replace name, host and port of an existing server. Status is kept.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::InvalidServer`] for a bad spec and
    /// [`HubError::ServerNotFound`] for an unknown id.
    pub fn update(&self, id: &str, spec: ServerSpec) -> HubResult<ManagedServer> {
        spec.validate().map_err(|e| HubError::InvalidServer(e.to_string()))?;

        let mut servers = self.servers.write();
        let server = servers
            .get_mut(id)
            .ok_or_else(|| HubError::ServerNotFound(id.to_string()))?;
        server.name = spec.name;
        server.host = spec.host;
        server.port = spec.port;
        Ok(server.clone())
    }

    /// Remove a server.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::ProtectedServer`] for the local entry and
    /// [`HubError::ServerNotFound`] for an unknown id.
    pub fn delete(&self, id: &str) -> HubResult<()> {
        if id == LOCAL_SERVER_ID {
            return Err(HubError::ProtectedServer(id.to_string()));
        }
        self.servers
            .write()
            .remove(id)
            .ok_or_else(|| HubError::ServerNotFound(id.to_string()))?;
        info!(server = id, "managed server deleted");
        Ok(())
    }

    /// Copy of one server.
    #[must_use]
    pub fn get_by_id(&self, id: &str) -> Option<ManagedServer> {
        self.servers.read().get(id).cloned()
    }

    /// Copies of all servers, local first, then ordered by id.
    #[must_use]
    pub fn get_all(&self) -> Vec<ManagedServer> {
        let mut servers: Vec<ManagedServer> = self.servers.read().values().cloned().collect();
        servers.sort_by(|a, b| b.is_local().cmp(&a.is_local()).then_with(|| a.id.cmp(&b.id)));
        servers
    }

    /// Number of servers, including the local entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.servers.read().len()
    }

    /// Always `false`; the local entry cannot be removed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.servers.read().is_empty()
    }

    /// Probe one server and record the result.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::ServerNotFound`] for an unknown id.
    pub async fn check_status(&self, id: &str) -> HubResult<ServerStatus> {
        let address = self
            .servers
            .read()
            .get(id)
            .map(ManagedServer::address)
            .ok_or_else(|| HubError::ServerNotFound(id.to_string()))?;

        let status = probe(&address, self.probe_timeout).await;

        if let Some(server) = self.servers.write().get_mut(id) {
            if server.status != status {
                info!(server = id, %address, status = ?status, "managed server status changed");
            }
            server.status = status;
        }
        Ok(status)
    }

    /// Probe every server concurrently. Returns `(id, status)` pairs ordered
    /// like [`get_all`](Self::get_all).
    pub async fn check_all_status(&self) -> Vec<(String, ServerStatus)> {
        let ids: Vec<String> = self.get_all().into_iter().map(|s| s.id).collect();
        let results = join_all(ids.iter().map(|id| self.check_status(id))).await;

        ids.into_iter()
            .zip(results)
            .filter_map(|(id, result)| result.ok().map(|status| (id, status)))
            .collect()
    }
}

async fn probe(address: &str, limit: Duration) -> ServerStatus {
    match timeout(limit, TcpStream::connect(address)).await {
        Ok(Ok(_stream)) => ServerStatus::Online,
        Ok(Err(e)) => {
            debug!(%address, error = %e, "probe failed");
            ServerStatus::Offline
        }
        Err(_) => {
            debug!(%address, timeout_ms = limit.as_millis() as u64, "probe timed out");
            ServerStatus::Offline
        }
    }
}
