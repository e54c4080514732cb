//! Collector contracts consumed by the broadcaster and the HTTP layer.
//!
//! Implementations are expected to be quick and to never block indefinitely.
//! Failures inside a collector degrade to empty values; only container actions
//! report errors, because an operator is waiting on their outcome.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use pulse_proto::{Container, ContainerAction, SystemSnapshot};

use crate::error::{CollectError, CollectResult};

/// Produces a full host snapshot on demand.
pub trait SnapshotSource: Send + Sync {
    /// Collect a fresh snapshot.
    fn collect_snapshot(&self) -> Pin<Box<dyn Future<Output = SystemSnapshot> + Send + '_>>;

    /// Whether any GPU was seen by this source.
    fn gpu_available(&self) -> bool {
        false
    }
}

/// Lists containers and applies lifecycle actions.
pub trait ContainerSource: Send + Sync {
    /// List running containers. Returns an empty list when the engine is unreachable.
    fn list_containers(&self) -> Pin<Box<dyn Future<Output = Vec<Container>> + Send + '_>>;

    /// Apply an action to one container.
    fn perform_action<'a>(
        &'a self,
        id: &'a str,
        action: ContainerAction,
    ) -> Pin<Box<dyn Future<Output = CollectResult<()>> + Send + 'a>>;

    /// Whether the engine currently answers.
    fn is_available(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>>;
}

/// Container source for hosts without a container engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoContainers;

impl ContainerSource for NoContainers {
    fn list_containers(&self) -> Pin<Box<dyn Future<Output = Vec<Container>> + Send + '_>> {
        Box::pin(async { Vec::new() })
    }

    fn perform_action<'a>(
        &'a self,
        _id: &'a str,
        _action: ContainerAction,
    ) -> Pin<Box<dyn Future<Output = CollectResult<()>> + Send + 'a>> {
        Box::pin(async {
            Err(CollectError::Unavailable(
                "no container engine configured".to_string(),
            ))
        })
    }

    fn is_available(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        Box::pin(async { false })
    }
}

/// A fake snapshot source for testing.
///
/// Returns a fixed snapshot and counts how often it was asked.
#[derive(Debug, Default)]
pub struct FakeSnapshotSource {
    snapshot: Mutex<SystemSnapshot>,
    calls: AtomicUsize,
    gpu: bool,
}

impl FakeSnapshotSource {
    /// Create a fake returning a default snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the given snapshot.
    #[must_use]
    pub fn with_snapshot(self, snapshot: SystemSnapshot) -> Self {
        *self.snapshot.lock() = snapshot;
        self
    }

    /// Report GPUs as present.
    #[must_use]
    pub fn with_gpu(mut self) -> Self {
        self.gpu = true;
        self
    }

    /// Replace the snapshot returned by later calls.
    pub fn set_snapshot(&self, snapshot: SystemSnapshot) {
        *self.snapshot.lock() = snapshot;
    }

    /// Number of collections performed so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SnapshotSource for FakeSnapshotSource {
    fn collect_snapshot(&self) -> Pin<Box<dyn Future<Output = SystemSnapshot> + Send + '_>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.snapshot.lock().clone()
        })
    }

    fn gpu_available(&self) -> bool {
        self.gpu
    }
}

/// A fake container source for testing.
#[derive(Debug)]
pub struct FakeContainerSource {
    containers: Mutex<Vec<Container>>,
    actions: Mutex<Vec<(String, ContainerAction)>>,
    calls: AtomicUsize,
    available: bool,
}

impl Default for FakeContainerSource {
    fn default() -> Self {
        Self {
            containers: Mutex::new(Vec::new()),
            actions: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            available: true,
        }
    }
}

impl FakeContainerSource {
    /// Create an available fake with no containers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fake whose engine is unreachable.
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::default()
        }
    }

    /// Add a container to the listing.
    #[must_use]
    pub fn with_container(self, container: Container) -> Self {
        self.containers.lock().push(container);
        self
    }

    /// Number of listings performed so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Actions applied so far, in order.
    pub fn actions(&self) -> Vec<(String, ContainerAction)> {
        self.actions.lock().clone()
    }
}

impl ContainerSource for FakeContainerSource {
    fn list_containers(&self) -> Pin<Box<dyn Future<Output = Vec<Container>> + Send + '_>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.available {
                return Vec::new();
            }
            self.containers.lock().clone()
        })
    }

    fn perform_action<'a>(
        &'a self,
        id: &'a str,
        action: ContainerAction,
    ) -> Pin<Box<dyn Future<Output = CollectResult<()>> + Send + 'a>> {
        Box::pin(async move {
            if !self.available {
                return Err(CollectError::Unavailable("fake engine offline".to_string()));
            }
            if !self.containers.lock().iter().any(|c| c.id == id) {
                return Err(CollectError::ContainerNotFound(id.to_string()));
            }
            self.actions.lock().push((id.to_string(), action));
            Ok(())
        })
    }

    fn is_available(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        Box::pin(async move { self.available })
    }
}
