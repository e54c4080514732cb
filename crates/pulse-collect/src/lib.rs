//! # pulse-collect
//!
//! Producers of plain data snapshots: the local host, its GPUs and its
//! container engine. Every collector degrades to empty or zero values when
//! the underlying facility is missing, so callers always have something to
//! publish.
//!
//! ## Features
//!
//! - `host` (default): [`HostCollector`] backed by `sysinfo`
//! - `docker`: [`DockerSource`] backed by `bollard`

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod gpu;
pub mod source;

#[cfg(feature = "docker")]
pub mod docker;
#[cfg(feature = "host")]
pub mod host;

pub use error::{CollectError, CollectResult};
pub use gpu::{GpuReader, NvidiaSmi};
pub use source::{
    ContainerSource, FakeContainerSource, FakeSnapshotSource, NoContainers, SnapshotSource,
};

#[cfg(feature = "docker")]
pub use docker::DockerSource;
#[cfg(feature = "host")]
pub use host::HostCollector;
