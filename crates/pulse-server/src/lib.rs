//! # pulse-server
//!
//! HTTP and WebSocket front end for the Pulse telemetry dashboard.
//!
//! The server owns one [`Hub`](pulse_hub::Hub) and one of each registry, runs
//! the broadcaster and the liveness sweeper in the background, and exposes
//! everything under `/api`.
//!
//! ## API Endpoints
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/api/health` | GET | Liveness and capability summary |
//! | `/api/ws` | GET | WebSocket stream of live updates |
//! | `/api/system` | GET | Snapshot of this host, collected on demand |
//! | `/api/docker` | GET | Container list |
//! | `/api/docker/{container_id}/action` | POST | Start, stop or restart a container |
//! | `/api/metrics` | POST | Metrics push from a remote agent |
//! | `/api/clients` | GET | Remote agents |
//! | `/api/clients/{id}` | GET, DELETE | One remote agent |
//! | `/api/servers` | GET, POST | Managed servers |
//! | `/api/servers/{id}` | PUT, DELETE | One managed server |
//! | `/api/servers/{id}/check` | POST | Probe one managed server |
//! | `/api/servers/check` | POST | Probe every managed server |

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;
pub mod websocket;

pub use config::DashboardConfig;
pub use error::{DashboardError, DashboardResult};
pub use routes::create_router;
pub use server::DashboardServer;
pub use state::DashboardState;
