//! Route configuration for the dashboard API.

use std::sync::Arc;

use axum::routing::{get, post, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::DashboardConfig;
use crate::handlers::{
    add_server, check_all_servers, check_server, container_action, delete_client, delete_server,
    get_client, get_system, health_check, list_clients, list_containers, list_servers,
    receive_metrics, update_server,
};
use crate::state::DashboardState;
use crate::websocket::ws_upgrade;

/// Create the dashboard API router.
pub fn create_router(state: Arc<DashboardState>) -> Router {
    let cors = build_cors_layer(state.config());

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/ws", get(ws_upgrade))
        // Local host
        .route("/system", get(get_system))
        .route("/docker", get(list_containers))
        .route("/docker/{container_id}/action", post(container_action))
        // Remote agents
        .route("/metrics", post(receive_metrics))
        .route("/clients", get(list_clients))
        .route("/clients/{id}", get(get_client).delete(delete_client))
        // Managed servers
        .route("/servers", get(list_servers).post(add_server))
        .route("/servers/check", post(check_all_servers))
        .route("/servers/{id}", axum::routing::put(update_server).delete(delete_server))
        .route("/servers/{id}/check", post(check_server));

    Router::new()
        .nest("/api", api_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn build_cors_layer(config: &DashboardConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if config.cors_origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        layer.allow_origin(origins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use pulse_collect::{FakeContainerSource, FakeSnapshotSource};
    use pulse_proto::{Container, LiveUpdate, SystemSnapshot};
    use tower::ServiceExt;

    fn make_test_state() -> Arc<DashboardState> {
        make_state_with(FakeContainerSource::new().with_container(Container {
            id: "c0ffee".to_string(),
            name: "web".to_string(),
            ..Container::default()
        }))
    }

    fn make_state_with(containers: FakeContainerSource) -> Arc<DashboardState> {
        let system = FakeSnapshotSource::new().with_snapshot(SystemSnapshot {
            hostname: "dash-host".to_string(),
            ..SystemSnapshot::default()
        });
        Arc::new(DashboardState::new(
            DashboardConfig::default(),
            Arc::new(system),
            Arc::new(containers),
        ))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .header("user-agent", "pulse-agent/0.1.0 (linux; x86_64)")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    // ==================== Local host ====================

    #[tokio::test]
    async fn test_health_endpoint() {
        let (status, json) = send(create_router(make_test_state()), get_request("/api/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["docker_available"], true);
        assert_eq!(json["gpu_available"], false);
        assert_eq!(json["subscribers"], 0);
    }

    #[tokio::test]
    async fn test_system_endpoint() {
        let state = make_test_state();
        let _queue = state.hub().subscribe(4);

        let (status, json) = send(create_router(state), get_request("/api/system")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["hostname"], "dash-host");
        assert_eq!(json["ws_clients"], 1);
    }

    #[tokio::test]
    async fn test_docker_list() {
        let (status, json) = send(create_router(make_test_state()), get_request("/api/docker")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json.as_array().unwrap().len(), 1);
        assert_eq!(json[0]["name"], "web");
    }

    #[tokio::test]
    async fn test_docker_action_success() {
        let request = json_request("POST", "/api/docker/c0ffee/action?action=restart", "");
        let (status, json) = send(create_router(make_test_state()), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
    }

    #[tokio::test]
    async fn test_docker_action_missing_action() {
        let request = json_request("POST", "/api/docker/c0ffee/action", "");
        let (status, _) = send(create_router(make_test_state()), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_docker_action_unknown_action() {
        let request = json_request("POST", "/api/docker/c0ffee/action?action=explode", "");
        let (status, _) = send(create_router(make_test_state()), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_docker_action_failure_is_500() {
        let request = json_request("POST", "/api/docker/missing/action?action=stop", "");
        let (status, json) = send(create_router(make_test_state()), request).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn test_docker_action_engine_down_is_503() {
        let state = make_state_with(FakeContainerSource::unavailable());
        let request = json_request("POST", "/api/docker/c0ffee/action?action=start", "");
        let (status, _) = send(create_router(state), request).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    // ==================== Remote agents ====================

    #[tokio::test]
    async fn test_metrics_push_registers_client() {
        let state = make_test_state();
        let mut queue = state.hub().subscribe(4);
        let body = r#"{"server_id":"abc","system":{"hostname":"edge-1","uptime":42}}"#;

        let (status, json) =
            send(create_router(Arc::clone(&state)), json_request("POST", "/api/metrics", body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "received");

        let client = state.clients().get_by_id("abc").unwrap();
        assert_eq!(client.hostname, "edge-1");
        assert_eq!(client.platform, "linux");
        assert!(matches!(queue.try_recv().as_deref(), Some(LiveUpdate::Client(u)) if u.server_id == "abc"));
    }

    #[tokio::test]
    async fn test_metrics_push_twice_updates_single_entry() {
        let state = make_test_state();
        let app = create_router(Arc::clone(&state));
        let first = r#"{"server_id":"abc","system":{"uptime":1}}"#;
        let second = r#"{"server_id":"abc","system":{"uptime":2}}"#;

        send(app.clone(), json_request("POST", "/api/metrics", first)).await;
        send(app.clone(), json_request("POST", "/api/metrics", second)).await;

        let (_, json) = send(app, get_request("/api/clients")).await;
        let clients = json["clients"].as_array().unwrap();
        assert_eq!(clients.len(), 1);
        assert_eq!(clients[0]["server_id"], "abc");
        assert_eq!(clients[0]["status"], "online");
        assert_eq!(clients[0]["metrics"]["uptime"], 2);
    }

    #[tokio::test]
    async fn test_metrics_push_without_id_rejected() {
        let state = make_test_state();
        let body = r#"{"system":{"uptime":1}}"#;

        let (status, json) =
            send(create_router(Arc::clone(&state)), json_request("POST", "/api/metrics", body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "invalid_request");
        assert!(state.clients().is_empty());
    }

    #[tokio::test]
    async fn test_metrics_push_malformed_rejected() {
        let request = json_request("POST", "/api/metrics", "{\"server_id\": 5");
        let (status, _) = send(create_router(make_test_state()), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_client_get_and_delete() {
        let state = make_test_state();
        state
            .clients()
            .upsert("abc", "edge", "linux", SystemSnapshot::default())
            .unwrap();
        let app = create_router(state);

        let (status, json) = send(app.clone(), get_request("/api/clients/abc")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["hostname"], "edge");

        let delete = Request::builder()
            .method("DELETE")
            .uri("/api/clients/abc")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(app.clone(), delete).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(app, get_request("/api/clients/abc")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    // ==================== Managed servers ====================

    #[tokio::test]
    async fn test_servers_lists_local() {
        let (status, json) = send(create_router(make_test_state()), get_request("/api/servers")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["servers"][0]["id"], "local");
        assert_eq!(json["servers"][0]["port"], 8000);
    }

    #[tokio::test]
    async fn test_add_update_delete_server() {
        let app = create_router(make_test_state());

        let body = r#"{"name":"edge","host":"10.0.0.5","port":8000}"#;
        let (status, json) = send(app.clone(), json_request("POST", "/api/servers", body)).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = json["id"].as_str().unwrap().to_string();

        let body = r#"{"name":"edge-2","host":"10.0.0.6","port":8001}"#;
        let (status, json) =
            send(app.clone(), json_request("PUT", &format!("/api/servers/{id}"), body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["name"], "edge-2");

        let delete = Request::builder()
            .method("DELETE")
            .uri(format!("/api/servers/{id}"))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(app, delete).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_add_server_invalid_spec() {
        let body = r#"{"name":"","host":"10.0.0.5","port":8000}"#;
        let request = json_request("POST", "/api/servers", body);
        let (status, _) = send(create_router(make_test_state()), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_local_forbidden() {
        let request = Request::builder()
            .method("DELETE")
            .uri("/api/servers/local")
            .body(Body::empty())
            .unwrap();
        let (status, json) = send(create_router(make_test_state()), request).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["error"], "forbidden");
    }

    #[tokio::test]
    async fn test_unknown_server_not_found() {
        let app = create_router(make_test_state());

        let request = Request::builder()
            .method("DELETE")
            .uri("/api/servers/srv-missing")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(app.clone(), request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(app, json_request("POST", "/api/servers/srv-missing/check", "")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_check_server_reports_status() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = make_test_state();
        let server = state
            .servers()
            .add(pulse_proto::ServerSpec::new("up", "127.0.0.1", port))
            .unwrap();

        let uri = format!("/api/servers/{}/check", server.id);
        let (status, json) = send(create_router(state), json_request("POST", &uri, "")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "online");
    }

    // ==================== Router ====================

    #[tokio::test]
    async fn test_unknown_endpoint() {
        let (status, _) = send(create_router(make_test_state()), get_request("/api/unknown")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_ws_requires_upgrade() {
        let (status, _) = send(create_router(make_test_state()), get_request("/api/ws")).await;
        assert!(status.is_client_error());
    }

    #[tokio::test]
    async fn test_cors_any_origin() {
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/api/health")
            .header("Origin", "http://example.com")
            .header("Access-Control-Request-Method", "GET")
            .body(Body::empty())
            .unwrap();

        let response = create_router(make_test_state()).oneshot(request).await.unwrap();

        assert!(response.status().is_success());
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
    }
}
