//! Operator-configured dashboard peers.

use serde::{Deserialize, Serialize};

use crate::error::ProtoError;

/// Id of the always-present entry describing this server.
pub const LOCAL_SERVER_ID: &str = "local";

/// Reachability of a managed server, as of its last probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    /// Last probe connected.
    Online,
    /// Last probe failed, or never probed.
    Offline,
}

/// A dashboard peer tracked by the server registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedServer {
    /// Registry-assigned id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Host name or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Last probe result.
    pub status: ServerStatus,
}

impl ManagedServer {
    /// Whether this is the fixed local entry.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.id == LOCAL_SERVER_ID
    }

    /// `host:port` suitable for a TCP connect. IPv6 literals are bracketed.
    #[must_use]
    pub fn address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Operator input for adding or updating a managed server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSpec {
    /// Display name.
    pub name: String,
    /// Host name or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl ServerSpec {
    /// Create a new spec.
    #[must_use]
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
        }
    }

    /// Check the spec is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the name or host is blank or the port is zero.
    pub fn validate(&self) -> Result<(), ProtoError> {
        if self.name.trim().is_empty() {
            return Err(ProtoError::Validation("server name is required".to_string()));
        }
        if self.host.trim().is_empty() {
            return Err(ProtoError::Validation("server host is required".to_string()));
        }
        if self.port == 0 {
            return Err(ProtoError::Validation("server port must be non-zero".to_string()));
        }
        Ok(())
    }
}
