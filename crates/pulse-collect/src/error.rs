//! Error types for collectors.

use thiserror::Error;

/// Result type alias for collector operations.
pub type CollectResult<T> = Result<T, CollectError>;

/// Errors raised by collectors.
///
/// Listing and snapshot paths swallow these and degrade; only container
/// actions surface them to the caller.
#[derive(Debug, Error)]
pub enum CollectError {
    /// The container engine could not be reached.
    #[error("container engine unavailable: {0}")]
    Unavailable(String),

    /// Container does not exist.
    #[error("container {0} not found")]
    ContainerNotFound(String),

    /// The engine rejected an action.
    #[error("failed to {action} container {id}: {reason}")]
    ActionFailed {
        /// Action name.
        action: String,
        /// Container id.
        id: String,
        /// Engine reason.
        reason: String,
    },

    /// GPU tool missing or output unreadable.
    #[error("gpu query failed: {0}")]
    Gpu(String),

    /// A blocking collection task panicked or was cancelled.
    #[error("collection task failed: {0}")]
    Task(String),
}
