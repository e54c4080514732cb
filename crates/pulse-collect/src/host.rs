//! Local host snapshot via `sysinfo`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use pulse_proto::{
    CpuInfo, DiskInfo, DistroInfo, GpuInfo, MemoryInfo, NetworkInterface, SystemSnapshot,
};
use sysinfo::{Disks, Networks, System};
use tracing::{debug, warn};

use crate::gpu::{GpuReader, NvidiaSmi};
use crate::source::SnapshotSource;

/// Collects snapshots of the machine the process runs on.
///
/// CPU usage is measured between consecutive collections, so the collector
/// keeps its `System` handle alive across calls.
#[derive(Clone)]
pub struct HostCollector {
    system: Arc<Mutex<System>>,
    gpu: Arc<dyn GpuReader>,
    gpu_seen: Arc<AtomicBool>,
}

impl std::fmt::Debug for HostCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostCollector")
            .field("gpu_seen", &self.gpu_seen.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Default for HostCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl HostCollector {
    /// Collector reading GPUs through `nvidia-smi`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_gpu_reader(Arc::new(NvidiaSmi::new()))
    }

    /// Collector with a custom GPU reader.
    #[must_use]
    pub fn with_gpu_reader(gpu: Arc<dyn GpuReader>) -> Self {
        let mut system = System::new_all();
        system.refresh_cpu_usage();
        Self {
            system: Arc::new(Mutex::new(system)),
            gpu,
            gpu_seen: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Collect synchronously. Blocks on OS queries and the GPU tool.
    pub fn collect_blocking(&self) -> SystemSnapshot {
        let (cpu, memory) = {
            let mut system = self.system.lock();
            system.refresh_cpu_usage();
            system.refresh_memory();
            (cpu_info(&system), MemoryInfo::from_usage(system.total_memory(), system.used_memory()))
        };

        let gpu = read_gpus(self.gpu.as_ref());
        if !gpu.is_empty() {
            self.gpu_seen.store(true, Ordering::Relaxed);
        }

        SystemSnapshot {
            hostname: System::host_name().unwrap_or_default(),
            os: std::env::consts::OS.to_string(),
            distro: distro_info(),
            cpu,
            memory,
            disks: disk_info(),
            uptime: System::uptime(),
            gpu,
            network: network_info(),
            ws_clients: 0,
        }
    }
}

impl SnapshotSource for HostCollector {
    fn collect_snapshot(&self) -> Pin<Box<dyn Future<Output = SystemSnapshot> + Send + '_>> {
        let collector = self.clone();
        Box::pin(async move {
            match tokio::task::spawn_blocking(move || collector.collect_blocking()).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(error = %e, "host collection task failed");
                    SystemSnapshot::default()
                }
            }
        })
    }

    fn gpu_available(&self) -> bool {
        self.gpu_seen.load(Ordering::Relaxed)
    }
}

fn cpu_info(system: &System) -> CpuInfo {
    let cpus = system.cpus();
    CpuInfo {
        brand: cpus
            .first()
            .map(|c| c.brand().trim().to_string())
            .unwrap_or_default(),
        percent: f64::from(system.global_cpu_usage()),
        cores: 0,
        threads: cpus.len(),
        per_core_percent: cpus.iter().map(|c| f64::from(c.cpu_usage())).collect(),
    }
}

fn read_gpus(reader: &dyn GpuReader) -> Vec<GpuInfo> {
    match reader.read() {
        Ok(gpus) => gpus,
        Err(e) => {
            debug!(error = %e, "no gpu metrics");
            Vec::new()
        }
    }
}

fn distro_info() -> Option<DistroInfo> {
    let name = System::long_os_version()?;
    Some(DistroInfo {
        name,
        id: System::distribution_id(),
    })
}

fn disk_info() -> Vec<DiskInfo> {
    let disks = Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .filter(|d| d.total_space() > 0)
        .map(|d| {
            DiskInfo::from_space(
                d.mount_point().to_string_lossy(),
                d.total_space(),
                d.available_space(),
            )
        })
        .collect()
}

fn network_info() -> Vec<NetworkInterface> {
    let networks = Networks::new_with_refreshed_list();
    let mut interfaces: Vec<NetworkInterface> = networks
        .list()
        .iter()
        .map(|(name, data)| NetworkInterface {
            name: name.clone(),
            bytes_sent: data.total_transmitted(),
            bytes_recv: data.total_received(),
            packets_sent: data.total_packets_transmitted(),
            packets_recv: data.total_packets_received(),
            errors_in: data.total_errors_on_received(),
            errors_out: data.total_errors_on_transmitted(),
        })
        .collect();
    interfaces.sort_by(|a, b| a.name.cmp(&b.name));
    interfaces
}
