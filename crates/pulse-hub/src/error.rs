//! Error types for the hub and registries.

use thiserror::Error;

/// Result type alias for hub and registry operations.
pub type HubResult<T> = Result<T, HubError>;

/// Errors raised by the hub and registries.
#[derive(Debug, Error)]
pub enum HubError {
    /// The subscriber limit was reached.
    #[error("too many subscribers: {current} active, limit is {limit}")]
    TooManySubscribers {
        /// Subscribers currently registered.
        current: usize,
        /// Configured limit.
        limit: usize,
    },

    /// A pushed metrics report carried no usable id.
    #[error("invalid client id: {0:?}")]
    InvalidClientId(String),

    /// No remote client with this id.
    #[error("client not found: {0}")]
    ClientNotFound(String),

    /// No managed server with this id.
    #[error("server not found: {0}")]
    ServerNotFound(String),

    /// The server entry cannot be deleted.
    #[error("server {0} cannot be deleted")]
    ProtectedServer(String),

    /// Server spec failed validation.
    #[error("invalid server: {0}")]
    InvalidServer(String),

    /// Connection settings are inconsistent.
    #[error("invalid connection config: {0}")]
    InvalidConfig(String),
}

