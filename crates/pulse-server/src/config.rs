//! Dashboard server configuration.

use std::path::Path;
use std::time::Duration;

use pulse_hub::ConnectionConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{DashboardError, DashboardResult};

/// Configuration for the dashboard server.
///
/// Every field has a default, so a config file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Host or address to bind to.
    pub host: String,
    /// TCP port to bind to. Zero picks an ephemeral port.
    pub port: u16,
    /// Interval between broadcaster cycles, in milliseconds.
    pub poll_interval_ms: u64,
    /// Maximum concurrent WebSocket subscribers.
    pub max_ws_connections: usize,
    /// Outbound queue capacity per subscriber.
    pub queue_capacity: usize,
    /// Subscriber read deadline, in seconds.
    pub read_deadline_secs: u64,
    /// Heartbeat ping interval, in seconds.
    pub ping_interval_secs: u64,
    /// Single write timeout, in seconds.
    pub write_timeout_secs: u64,
    /// Silence after which a remote client is marked offline, in seconds.
    pub client_stale_secs: u64,
    /// Interval between liveness sweeps, in seconds.
    pub sweep_interval_secs: u64,
    /// TCP probe timeout for managed servers, in milliseconds.
    pub probe_timeout_ms: u64,
    /// CORS allowed origins (empty means all).
    pub cors_origins: Vec<String>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            poll_interval_ms: 2000,
            max_ws_connections: 1000,
            queue_capacity: 256,
            read_deadline_secs: 60,
            ping_interval_secs: 54,
            write_timeout_secs: 10,
            client_stale_secs: 30,
            sweep_interval_secs: 10,
            probe_timeout_ms: 2000,
            cors_origins: Vec::new(),
        }
    }
}

impl DashboardConfig {
    /// Read a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// fails validation.
    pub fn from_file(path: impl AsRef<Path>) -> DashboardResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DashboardError::Config(format!("failed to read config file '{}': {e}", path.display()))
        })?;
        Self::from_json(&content)
    }

    /// Parse configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid or fails validation.
    pub fn from_json(content: &str) -> DashboardResult<Self> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| DashboardError::Config(format!("invalid JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read `path` if given and present, otherwise use defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be parsed.
    pub fn load(path: Option<&Path>) -> DashboardResult<Self> {
        match path {
            Some(path) if path.exists() => Self::from_file(path),
            Some(path) => {
                info!(path = %path.display(), "config file not found, using defaults");
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    /// Set the bind host.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the bind port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the broadcaster interval in milliseconds.
    #[must_use]
    pub const fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set the maximum WebSocket subscribers.
    #[must_use]
    pub const fn with_max_ws_connections(mut self, max: usize) -> Self {
        self.max_ws_connections = max;
        self
    }

    /// Set the remote client staleness threshold in seconds.
    #[must_use]
    pub const fn with_client_stale_secs(mut self, secs: u64) -> Self {
        self.client_stale_secs = secs;
        self
    }

    /// Set the managed server probe timeout in milliseconds.
    #[must_use]
    pub const fn with_probe_timeout_ms(mut self, ms: u64) -> Self {
        self.probe_timeout_ms = ms;
        self
    }

    /// Add a CORS allowed origin.
    #[must_use]
    pub fn with_cors_origin(mut self, origin: impl Into<String>) -> Self {
        self.cors_origins.push(origin.into());
        self
    }

    /// `host:port` to bind to.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Interval between broadcaster cycles.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Silence after which a remote client goes offline.
    #[must_use]
    pub const fn client_stale_after(&self) -> Duration {
        Duration::from_secs(self.client_stale_secs)
    }

    /// Interval between liveness sweeps.
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// TCP probe timeout for managed servers.
    #[must_use]
    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Per-subscriber connection settings.
    #[must_use]
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig::default()
            .with_read_deadline(Duration::from_secs(self.read_deadline_secs))
            .with_ping_interval(Duration::from_secs(self.ping_interval_secs))
            .with_write_timeout(Duration::from_secs(self.write_timeout_secs))
            .with_queue_capacity(self.queue_capacity)
    }

    /// Check the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if any interval or limit is zero, or if the heartbeat
    /// is not shorter than the read deadline.
    pub fn validate(&self) -> DashboardResult<()> {
        if self.host.trim().is_empty() {
            return Err(DashboardError::Config("host must not be empty".to_string()));
        }
        let zeroes = [
            ("poll_interval_ms", self.poll_interval_ms),
            ("max_ws_connections", self.max_ws_connections as u64),
            ("client_stale_secs", self.client_stale_secs),
            ("sweep_interval_secs", self.sweep_interval_secs),
            ("probe_timeout_ms", self.probe_timeout_ms),
        ];
        if let Some((name, _)) = zeroes.iter().find(|(_, value)| *value == 0) {
            return Err(DashboardError::Config(format!("{name} must be greater than zero")));
        }
        self.connection_config()
            .validate()
            .map_err(|e| DashboardError::Config(e.to_string()))
    }
}
