//! Error types for the agent.

use thiserror::Error;

/// Result type alias for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;

/// Errors raised while reporting.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The server URL is not an http(s) URL.
    #[error("invalid server url: {0}")]
    InvalidUrl(String),

    /// The request could not be built or sent.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("server rejected report with status {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AgentError::Rejected {
            status: 400,
            body: "server_id is required".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "server rejected report with status 400: server_id is required"
        );

        let err = AgentError::InvalidUrl("ftp://x".to_string());
        assert_eq!(err.to_string(), "invalid server url: ftp://x");
    }
}
