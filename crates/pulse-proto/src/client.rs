//! Remote agents that push their own metrics.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::snapshot::SystemSnapshot;

/// Liveness of a remote agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientStatus {
    /// Pushed within the staleness threshold.
    Online,
    /// No push within the staleness threshold.
    Offline,
}

impl fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => f.write_str("online"),
            Self::Offline => f.write_str("offline"),
        }
    }
}

/// A remote agent known to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteClient {
    /// Identifier supplied by the agent.
    #[serde(rename = "server_id")]
    pub id: String,
    /// Host name of the agent machine.
    pub hostname: String,
    /// Platform derived from the agent's user agent.
    pub platform: String,
    /// Current liveness.
    pub status: ClientStatus,
    /// Time of the most recent push.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub last_seen: DateTime<Utc>,
    /// Latest snapshot, replaced wholesale on each push.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<SystemSnapshot>,
}

impl RemoteClient {
    /// Whether the client counts as online.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.status == ClientStatus::Online
    }
}

/// Body of an agent metrics push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    /// Agent identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    /// Snapshot collected on the agent.
    pub system: SystemSnapshot,
}

impl MetricsReport {
    /// The identifier exactly as sent, if present and not blank.
    #[must_use]
    pub fn usable_id(&self) -> Option<&str> {
        self.server_id.as_deref().filter(|id| !id.trim().is_empty())
    }
}

/// Payload of a client-scoped live update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientUpdate {
    /// Agent identifier.
    pub server_id: String,
    /// Snapshot just pushed by that agent.
    pub metrics: SystemSnapshot,
}
