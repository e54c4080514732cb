//! Docker engine source using bollard.

use std::future::Future;
use std::pin::Pin;

use bollard::Docker;
use bollard::container::{
    ListContainersOptions, RestartContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::models::{ContainerSummary, Port, PortTypeEnum};
use pulse_proto::{Container, ContainerAction};
use tracing::{debug, info, warn};

use crate::error::{CollectError, CollectResult};
use crate::source::ContainerSource;

/// Seconds the engine waits before killing on stop/restart.
const STOP_GRACE_SECS: i64 = 10;

/// Container source backed by the local Docker engine.
#[derive(Debug, Clone)]
pub struct DockerSource {
    client: Docker,
}

impl DockerSource {
    /// Connect using the platform default socket or `DOCKER_HOST`.
    ///
    /// Connecting does not contact the engine; an unreachable engine shows up
    /// later as empty listings and `is_available() == false`.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection settings are invalid.
    pub fn connect() -> CollectResult<Self> {
        let client = Docker::connect_with_local_defaults()
            .map_err(|e| CollectError::Unavailable(e.to_string()))?;
        Ok(Self { client })
    }

    fn map_error(action: ContainerAction, id: &str, err: bollard::errors::Error) -> CollectError {
        match err {
            bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            } => CollectError::ContainerNotFound(id.to_string()),
            e => CollectError::ActionFailed {
                action: action.to_string(),
                id: id.to_string(),
                reason: e.to_string(),
            },
        }
    }
}

/// Convert an engine summary to the dashboard view.
pub(crate) fn to_container(summary: ContainerSummary) -> Container {
    let id = summary.id.unwrap_or_default();
    let image = summary
        .image
        .filter(|i| !i.is_empty())
        .unwrap_or_else(|| Container::short_id(summary.image_id.as_deref().unwrap_or_default()));

    Container {
        id: Container::short_id(&id),
        name: summary
            .names
            .and_then(|n| n.into_iter().next())
            .map(|n| n.trim_start_matches('/').to_string())
            .unwrap_or_default(),
        image,
        status: summary.status.unwrap_or_default(),
        ports: format_ports(summary.ports.as_deref().unwrap_or_default()),
        state: summary.state.unwrap_or_default(),
    }
}

/// Render published ports as `public:type/private`, space separated.
pub(crate) fn format_ports(ports: &[Port]) -> String {
    if ports.is_empty() {
        return "N/A".to_string();
    }

    ports
        .iter()
        .map(|p| {
            let typ = match p.typ {
                Some(PortTypeEnum::UDP) => "udp",
                Some(PortTypeEnum::SCTP) => "sctp",
                _ => "tcp",
            };
            match p.public_port {
                Some(public) if public > 0 => format!("{public}:{typ}/{}", p.private_port),
                _ => format!("{typ}/{}", p.private_port),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

impl ContainerSource for DockerSource {
    fn list_containers(&self) -> Pin<Box<dyn Future<Output = Vec<Container>> + Send + '_>> {
        Box::pin(async move {
            let options = ListContainersOptions::<String> {
                all: false,
                ..Default::default()
            };

            match self.client.list_containers(Some(options)).await {
                Ok(summaries) => summaries.into_iter().map(to_container).collect(),
                Err(e) => {
                    debug!(error = %e, "docker unavailable, reporting no containers");
                    Vec::new()
                }
            }
        })
    }

    fn perform_action<'a>(
        &'a self,
        id: &'a str,
        action: ContainerAction,
    ) -> Pin<Box<dyn Future<Output = CollectResult<()>> + Send + 'a>> {
        Box::pin(async move {
            debug!(id, %action, "applying container action");

            let result = match action {
                ContainerAction::Start => {
                    self.client
                        .start_container(id, None::<StartContainerOptions<String>>)
                        .await
                }
                ContainerAction::Stop => {
                    self.client
                        .stop_container(id, Some(StopContainerOptions { t: STOP_GRACE_SECS }))
                        .await
                }
                ContainerAction::Restart => {
                    self.client
                        .restart_container(
                            id,
                            Some(RestartContainerOptions {
                                t: STOP_GRACE_SECS as isize,
                            }),
                        )
                        .await
                }
            };

            match result {
                Ok(()) => {
                    info!(id, %action, "container action applied");
                    Ok(())
                }
                // Already in the requested state.
                Err(bollard::errors::Error::DockerResponseServerError {
                    status_code: 304, ..
                }) => Ok(()),
                Err(e) => {
                    warn!(id, %action, error = %e, "container action failed");
                    Err(Self::map_error(action, id, e))
                }
            }
        })
    }

    fn is_available(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        Box::pin(async move { self.client.ping().await.is_ok() })
    }
}
