//! # pulse-hub
//!
//! Real-time fan-out and liveness tracking for the Pulse telemetry dashboard.
//!
//! - [`Hub`]: the set of live subscribers and non-blocking fan-out
//! - [`run_connection`]: per-subscriber read/write pumps with heartbeats
//! - [`Broadcaster`]: timer loops that collect and publish only while someone listens
//! - [`RemoteClientRegistry`]: agents that push metrics, with a staleness sweep
//! - [`ServerRegistry`]: operator-configured peers and TCP reachability probes
//!
//! Registries are plain values; the process constructs one of each and shares
//! them behind `Arc`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod broadcaster;
pub mod clients;
pub mod connection;
pub mod error;
pub mod hub;
pub mod servers;
pub mod subscriber;

pub use broadcaster::{Broadcaster, BroadcasterHandles, CycleOutcome, MIN_INTERVAL};
pub use clients::{RemoteClientRegistry, UpsertOutcome};
pub use connection::{
    run_connection, CloseReason, ConnectionConfig, ConnectionOutcome, Frame, SubscriberState,
};
pub use error::{HubError, HubResult};
pub use hub::Hub;
pub use servers::ServerRegistry;
pub use subscriber::{subscriber_channel, Subscriber, SubscriberId, SubscriberQueue};
