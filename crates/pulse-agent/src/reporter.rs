//! Periodic metrics push to a dashboard server.

use std::future::Future;
use std::time::Duration;

use pulse_collect::SnapshotSource;
use pulse_proto::{MetricsReport, SystemSnapshot};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::{AgentError, AgentResult};

/// Default interval between reports.
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(5);

/// Per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// `pulse-agent/<version> (<os>; <arch>)`; the server derives the platform from it.
#[must_use]
pub fn user_agent() -> String {
    format!(
        "pulse-agent/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Sends snapshots for one agent id to one server.
#[derive(Debug, Clone)]
pub struct Reporter {
    client: reqwest::Client,
    endpoint: String,
    server_id: String,
}

impl Reporter {
    /// Create a reporter for `server_url` (scheme and host, optional path prefix).
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not http(s) or the client cannot be built.
    pub fn new(server_url: &str, server_id: impl Into<String>) -> AgentResult<Self> {
        let base = server_url.trim().trim_end_matches('/');
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(AgentError::InvalidUrl(server_url.to_string()));
        }

        let client = reqwest::Client::builder()
            .user_agent(user_agent())
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{base}/api/metrics"),
            server_id: server_id.into(),
        })
    }

    /// Full URL reports are posted to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Id sent with every report.
    #[must_use]
    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// Post one snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-success status.
    pub async fn report(&self, system: SystemSnapshot) -> AgentResult<()> {
        let body = MetricsReport {
            server_id: Some(self.server_id.clone()),
            system,
        };
        let response = self.client.post(&self.endpoint).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    /// Report immediately, then every `every`, until `shutdown` completes.
    ///
    /// Failed reports are logged and the loop carries on. Returns the number
    /// of successful reports.
    pub async fn run<F>(&self, source: &dyn SnapshotSource, every: Duration, shutdown: F) -> u64
    where
        F: Future<Output = ()>,
    {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(endpoint = %self.endpoint, server_id = %self.server_id, interval_secs = every.as_secs(), "reporting metrics");

        let mut sent = 0;
        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = ticker.tick() => {}
            }

            let snapshot = source.collect_snapshot().await;
            match self.report(snapshot).await {
                Ok(()) => {
                    sent += 1;
                    debug!(sent, "metrics reported");
                }
                Err(e) => warn!(error = %e, "metrics report failed"),
            }
        }

        info!(sent, "reporter stopped");
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use pulse_collect::FakeSnapshotSource;
    use tokio::sync::mpsc;

    type Received = (String, MetricsReport);

    async fn receiver(status: StatusCode) -> (String, mpsc::UnboundedReceiver<Received>) {
        let (tx, rx) = mpsc::unbounded_channel::<Received>();
        let app = Router::new()
            .route(
                "/api/metrics",
                post(
                    move |State(tx): State<mpsc::UnboundedSender<Received>>,
                          headers: HeaderMap,
                          Json(report): Json<MetricsReport>| async move {
                        let ua = headers
                            .get("user-agent")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or_default()
                            .to_string();
                        let _ = tx.send((ua, report));
                        status
                    },
                ),
            )
            .with_state(tx);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), rx)
    }

    #[test]
    fn test_user_agent_names_platform() {
        let ua = user_agent();
        assert!(ua.starts_with("pulse-agent/"));
        assert!(ua.contains(std::env::consts::OS));
    }

    #[test]
    fn test_endpoint_normalized() {
        let reporter = Reporter::new("http://dash.local:8000/", "abc").unwrap();
        assert_eq!(reporter.endpoint(), "http://dash.local:8000/api/metrics");
        assert_eq!(reporter.server_id(), "abc");
    }

    #[test]
    fn test_non_http_url_rejected() {
        let err = Reporter::new("dash.local:8000", "abc").unwrap_err();
        assert!(matches!(err, AgentError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_report_posts_id_and_user_agent() {
        let (url, mut rx) = receiver(StatusCode::OK).await;
        let reporter = Reporter::new(&url, "agent-9").unwrap();

        let snapshot = SystemSnapshot {
            hostname: "edge".to_string(),
            ..SystemSnapshot::default()
        };
        reporter.report(snapshot).await.unwrap();

        let (ua, report) = rx.recv().await.unwrap();
        assert_eq!(ua, user_agent());
        assert_eq!(report.server_id.as_deref(), Some("agent-9"));
        assert_eq!(report.system.hostname, "edge");
    }

    #[tokio::test]
    async fn test_rejection_surfaces_status() {
        let (url, _rx) = receiver(StatusCode::BAD_REQUEST).await;
        let reporter = Reporter::new(&url, "agent-9").unwrap();

        let err = reporter.report(SystemSnapshot::default()).await.unwrap_err();
        assert!(matches!(err, AgentError::Rejected { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_run_reports_immediately_and_stops() {
        let (url, mut rx) = receiver(StatusCode::OK).await;
        let reporter = Reporter::new(&url, "agent-9").unwrap();
        let source = FakeSnapshotSource::new();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

        let run = reporter.run(&source, Duration::from_secs(3600), async {
            let _ = stop_rx.await;
        });
        let check = async {
            rx.recv().await.unwrap();
            let _ = stop_tx.send(());
        };
        let (sent, ()) = tokio::join!(run, check);

        assert_eq!(sent, 1);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_run_survives_unreachable_server() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);
        let reporter = Reporter::new(&url, "agent-9").unwrap();
        let source = FakeSnapshotSource::new();

        let sent = reporter
            .run(&source, Duration::from_millis(20), tokio::time::sleep(Duration::from_millis(150)))
            .await;

        assert_eq!(sent, 0);
        assert!(source.calls() >= 2);
    }
}
