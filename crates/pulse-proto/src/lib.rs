//! # pulse-proto
//!
//! Data types exchanged between the Pulse server, its live subscribers and
//! the remote agents that push metrics in.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod container;
pub mod error;
pub mod server;
pub mod snapshot;
pub mod update;

pub use client::{ClientStatus, ClientUpdate, MetricsReport, RemoteClient};
pub use container::{ActionResponse, Container, ContainerAction};
pub use error::ProtoError;
pub use server::{ManagedServer, ServerSpec, ServerStatus, LOCAL_SERVER_ID};
pub use snapshot::{
    format_bytes, CpuInfo, DiskInfo, DistroInfo, GpuInfo, GpuMemory, MemoryInfo,
    NetworkInterface, SystemSnapshot,
};
pub use update::{LiveUpdate, UpdateKind};
