//! # pulse-agent
//!
//! Runs on a remote machine and pushes its metrics to a Pulse dashboard
//! server, identified by an id that persists across restarts.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod identity;
pub mod reporter;

pub use error::{AgentError, AgentResult};
pub use identity::{default_id_path, load_or_create_id};
pub use reporter::{user_agent, Reporter, DEFAULT_REPORT_INTERVAL};
