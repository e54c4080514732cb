//! Messages pushed to live subscribers.

use serde::{Deserialize, Serialize};

use crate::client::ClientUpdate;
use crate::container::Container;
use crate::snapshot::SystemSnapshot;

/// A message fanned out to every live subscriber.
///
/// Serialized as `{"type": "<kind>", "data": <payload>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum LiveUpdate {
    /// Local host snapshot.
    System(SystemSnapshot),
    /// Local container list.
    Docker(Vec<Container>),
    /// Snapshot just pushed by a remote agent.
    Client(ClientUpdate),
}

/// Category of a [`LiveUpdate`], used for logging and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateKind {
    /// System snapshot.
    System,
    /// Container list.
    Docker,
    /// Remote agent push.
    Client,
}

impl UpdateKind {
    /// Wire name of the category.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Docker => "docker",
            Self::Client => "client",
        }
    }
}

impl LiveUpdate {
    /// The category of this update.
    #[must_use]
    pub const fn kind(&self) -> UpdateKind {
        match self {
            Self::System(_) => UpdateKind::System,
            Self::Docker(_) => UpdateKind::Docker,
            Self::Client(_) => UpdateKind::Client,
        }
    }

    /// Encode as a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized.
    pub fn to_json(&self) -> Result<String, crate::ProtoError> {
        Ok(serde_json::to_string(self)?)
    }
}
