//! Error types for the dashboard server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pulse_hub::HubError;
use serde::Serialize;
use thiserror::Error;

/// Result type alias for dashboard operations.
pub type DashboardResult<T> = Result<T, DashboardError>;

/// Errors that can occur in the dashboard server.
#[derive(Debug, Error)]
pub enum DashboardError {
    /// Failed to bind to the specified address.
    #[error("failed to bind to {0}: {1}")]
    BindFailed(String, std::io::Error),

    /// Configuration could not be loaded or is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// Resource not found.
    #[error("{0} not found: {1}")]
    NotFound(String, String),

    /// Invalid request parameters or body.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The operation is not allowed on this resource.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A backing facility is not available.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Too many WebSocket subscribers.
    #[error("too many connections: {0} active, limit is {1}")]
    TooManyConnections(usize, usize),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            Self::NotFound(_, _) => (StatusCode::NOT_FOUND, "not_found"),
            Self::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            Self::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
            Self::TooManyConnections(_, _) => {
                (StatusCode::SERVICE_UNAVAILABLE, "too_many_connections")
            }
            Self::BindFailed(_, _) | Self::Config(_) | Self::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
        };

        let json = serde_json::to_string(&body).unwrap_or_else(|_| {
            r#"{"error":"internal_error","message":"failed to serialize error"}"#.to_string()
        });

        (status, [("content-type", "application/json")], json).into_response()
    }
}

impl From<HubError> for DashboardError {
    fn from(err: HubError) -> Self {
        match err {
            HubError::TooManySubscribers { current, limit } => {
                Self::TooManyConnections(current, limit)
            }
            HubError::ClientNotFound(id) => Self::NotFound("client".to_string(), id),
            HubError::ServerNotFound(id) => Self::NotFound("server".to_string(), id),
            HubError::ProtectedServer(_) => Self::Forbidden(err.to_string()),
            HubError::InvalidClientId(_) | HubError::InvalidServer(_) => {
                Self::InvalidRequest(err.to_string())
            }
            HubError::InvalidConfig(_) => Self::Config(err.to_string()),
        }
    }
}
