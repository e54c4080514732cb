//! HTTP request handlers for the dashboard API.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::header::USER_AGENT;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use pulse_proto::{
    ActionResponse, Container, ContainerAction, ManagedServer, MetricsReport, RemoteClient,
    ServerSpec, SystemSnapshot,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{DashboardError, DashboardResult};
use crate::state::DashboardState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status message.
    pub status: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Whether the container engine answered.
    pub docker_available: bool,
    /// Whether a GPU has been seen on this host.
    pub gpu_available: bool,
    /// Live WebSocket subscribers.
    pub subscribers: usize,
}

/// Bare status acknowledgement.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Status message.
    pub status: String,
}

/// Bare message acknowledgement.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    /// Human-readable result.
    pub message: String,
}

/// Response to creating a managed server.
#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    /// Assigned id.
    pub id: String,
    /// Human-readable result.
    pub message: String,
}

/// List of remote clients.
#[derive(Debug, Serialize)]
pub struct ClientList {
    /// Clients ordered by id.
    pub clients: Vec<RemoteClient>,
}

/// List of managed servers.
#[derive(Debug, Serialize)]
pub struct ServerList {
    /// Servers, local entry first.
    pub servers: Vec<ManagedServer>,
}

/// Query parameters for container actions.
#[derive(Debug, Deserialize)]
pub struct ActionQuery {
    /// `start`, `stop` or `restart`.
    pub action: Option<String>,
}

/// Handle GET /api/health.
pub async fn health_check(State(state): State<Arc<DashboardState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.uptime_secs(),
        docker_available: state.container_source().is_available().await,
        gpu_available: state.system_source().gpu_available(),
        subscribers: state.hub().count(),
    })
}

/// Handle GET /api/system - snapshot collected on demand.
pub async fn get_system(State(state): State<Arc<DashboardState>>) -> Json<SystemSnapshot> {
    Json(state.snapshot().await)
}

/// Handle GET /api/docker - container list, empty when the engine is down.
pub async fn list_containers(State(state): State<Arc<DashboardState>>) -> Json<Vec<Container>> {
    Json(state.container_source().list_containers().await)
}

/// Handle POST `/api/docker/:container_id/action?action=...`.
pub async fn container_action(
    State(state): State<Arc<DashboardState>>,
    Path(container_id): Path<String>,
    Query(query): Query<ActionQuery>,
) -> DashboardResult<Response> {
    let containers = state.container_source();
    if !containers.is_available().await {
        return Err(DashboardError::Unavailable("docker is not available".to_string()));
    }

    let action = query
        .action
        .as_deref()
        .ok_or_else(|| DashboardError::InvalidRequest("action is required".to_string()))?
        .parse::<ContainerAction>()
        .map_err(|e| DashboardError::InvalidRequest(e.to_string()))?;

    match containers.perform_action(&container_id, action).await {
        Ok(()) => Ok(Json(ActionResponse::done(action, &container_id)).into_response()),
        Err(e) => {
            warn!(container = %container_id, action = %action, error = %e, "container action failed");
            Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ActionResponse::failed(e.to_string())),
            )
                .into_response())
        }
    }
}

/// Handle POST /api/metrics - push from a remote agent.
pub async fn receive_metrics(
    State(state): State<Arc<DashboardState>>,
    headers: HeaderMap,
    body: Bytes,
) -> DashboardResult<Json<StatusResponse>> {
    let report: MetricsReport = parse_body(&body)?;
    let id = report
        .usable_id()
        .ok_or_else(|| DashboardError::InvalidRequest("server_id is required".to_string()))?
        .to_string();

    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let platform = detect_platform(user_agent);
    let hostname = report.system.hostname.clone();

    let outcome = state
        .clients()
        .upsert(&id, &hostname, platform, report.system)?;
    debug!(client = %id, ?outcome, "metrics received");

    Ok(Json(StatusResponse {
        status: "received".to_string(),
    }))
}

/// Handle GET /api/clients.
pub async fn list_clients(State(state): State<Arc<DashboardState>>) -> Json<ClientList> {
    Json(ClientList {
        clients: state.clients().get_all(),
    })
}

/// Handle GET /api/clients/:id.
pub async fn get_client(
    State(state): State<Arc<DashboardState>>,
    Path(id): Path<String>,
) -> DashboardResult<Json<RemoteClient>> {
    state
        .clients()
        .get_by_id(&id)
        .map(Json)
        .ok_or_else(|| DashboardError::NotFound("client".to_string(), id))
}

/// Handle DELETE /api/clients/:id.
pub async fn delete_client(
    State(state): State<Arc<DashboardState>>,
    Path(id): Path<String>,
) -> DashboardResult<Json<MessageResponse>> {
    if !state.clients().delete(&id) {
        return Err(DashboardError::NotFound("client".to_string(), id));
    }
    Ok(Json(MessageResponse {
        message: format!("client {id} deleted"),
    }))
}

/// Handle GET /api/servers.
pub async fn list_servers(State(state): State<Arc<DashboardState>>) -> Json<ServerList> {
    Json(ServerList {
        servers: state.servers().get_all(),
    })
}

/// Handle POST /api/servers.
pub async fn add_server(
    State(state): State<Arc<DashboardState>>,
    body: Bytes,
) -> DashboardResult<(StatusCode, Json<CreatedResponse>)> {
    let spec: ServerSpec = parse_body(&body)?;
    let server = state.servers().add(spec)?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            id: server.id,
            message: "server added".to_string(),
        }),
    ))
}

/// Handle PUT /api/servers/:id.
pub async fn update_server(
    State(state): State<Arc<DashboardState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> DashboardResult<Json<ManagedServer>> {
    let spec: ServerSpec = parse_body(&body)?;
    Ok(Json(state.servers().update(&id, spec)?))
}

/// Handle DELETE /api/servers/:id.
pub async fn delete_server(
    State(state): State<Arc<DashboardState>>,
    Path(id): Path<String>,
) -> DashboardResult<Json<MessageResponse>> {
    state.servers().delete(&id)?;
    Ok(Json(MessageResponse {
        message: format!("server {id} deleted"),
    }))
}

/// Handle POST /api/servers/:id/check - probe one server.
pub async fn check_server(
    State(state): State<Arc<DashboardState>>,
    Path(id): Path<String>,
) -> DashboardResult<Json<ManagedServer>> {
    state.servers().check_status(&id).await?;
    state
        .servers()
        .get_by_id(&id)
        .map(Json)
        .ok_or_else(|| DashboardError::NotFound("server".to_string(), id))
}

/// Handle POST /api/servers/check - probe every server.
pub async fn check_all_servers(State(state): State<Arc<DashboardState>>) -> Json<ServerList> {
    state.servers().check_all_status().await;
    Json(ServerList {
        servers: state.servers().get_all(),
    })
}

/// Map a User-Agent to the platform label stored with a remote client.
#[must_use]
pub fn detect_platform(user_agent: &str) -> &'static str {
    let ua = user_agent.to_ascii_lowercase();
    if ua.contains("windows") {
        "windows"
    } else if ua.contains("linux") {
        "linux"
    } else if ua.contains("darwin") || ua.contains("macos") {
        "macos"
    } else {
        "unknown"
    }
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> DashboardResult<T> {
    serde_json::from_slice(body)
        .map_err(|e| DashboardError::InvalidRequest(format!("malformed body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("pulse-agent/0.1.0 (linux; x86_64)", "linux" ; "agent on linux")]
    #[test_case("pulse-agent/0.1.0 (macos; aarch64)", "macos" ; "agent on macos")]
    #[test_case("Mozilla/5.0 (Windows NT 10.0; Win64; x64)", "windows" ; "browser on windows")]
    #[test_case("Darwin/23.1.0", "macos" ; "darwin")]
    #[test_case("curl/8.4.0", "unknown" ; "curl")]
    #[test_case("", "unknown" ; "empty")]
    fn test_detect_platform(user_agent: &str, expected: &str) {
        assert_eq!(detect_platform(user_agent), expected);
    }

    #[test]
    fn test_parse_body_rejects_garbage() {
        let err = parse_body::<ServerSpec>(b"not json").unwrap_err();
        assert!(matches!(err, DashboardError::InvalidRequest(_)));
    }
}
