//! Point-in-time host measurements.
//!
//! A [`SystemSnapshot`] is produced by a collector (locally on the server or
//! on a remote agent) and is never mutated after publication, apart from the
//! server stamping the live subscriber count into [`SystemSnapshot::ws_clients`].

use serde::{Deserialize, Serialize};

/// Complete host measurement for one collection cycle.
///
/// Missing fields deserialize to their defaults, so older agents that report
/// a subset are still accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemSnapshot {
    /// Host name reported by the OS.
    pub hostname: String,
    /// OS family (e.g. "linux", "windows").
    pub os: String,
    /// Distribution details, when the OS exposes them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distro: Option<DistroInfo>,
    /// CPU usage.
    pub cpu: CpuInfo,
    /// Memory usage.
    pub memory: MemoryInfo,
    /// Mounted disks.
    pub disks: Vec<DiskInfo>,
    /// Seconds since boot.
    pub uptime: u64,
    /// GPUs, empty when none are detected.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub gpu: Vec<GpuInfo>,
    /// Network interfaces.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub network: Vec<NetworkInterface>,
    /// Live subscribers connected to the publishing server.
    pub ws_clients: usize,
}

impl SystemSnapshot {
    /// Returns a copy stamped with the given subscriber count.
    #[must_use]
    pub fn with_ws_clients(mut self, count: usize) -> Self {
        self.ws_clients = count;
        self
    }

    /// Whether at least one GPU was reported.
    #[must_use]
    pub fn has_gpu(&self) -> bool {
        !self.gpu.is_empty()
    }
}

/// Linux distribution identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistroInfo {
    /// Pretty name (e.g. "Ubuntu 24.04 LTS").
    #[serde(default)]
    pub name: String,
    /// Short id (e.g. "ubuntu").
    #[serde(default)]
    pub id: String,
}

/// CPU usage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuInfo {
    /// Model name.
    pub brand: String,
    /// Global usage, 0-100.
    pub percent: f64,
    /// Physical cores, 0 when unknown.
    #[serde(default)]
    pub cores: usize,
    /// Logical threads.
    pub threads: usize,
    /// Usage per logical core, 0-100.
    #[serde(default)]
    pub per_core_percent: Vec<f64>,
}

/// Memory usage in bytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryInfo {
    /// Total bytes.
    pub total: u64,
    /// Used bytes.
    pub used: u64,
    /// Free bytes.
    pub free: u64,
    /// Used fraction, 0-100.
    pub percent: f64,
    /// Human readable total.
    #[serde(default)]
    pub total_human: String,
    /// Human readable used.
    #[serde(default)]
    pub used_human: String,
    /// Human readable free.
    #[serde(default)]
    pub free_human: String,
}

impl MemoryInfo {
    /// Build from raw byte counts, deriving the percentage and labels.
    #[must_use]
    pub fn from_usage(total: u64, used: u64) -> Self {
        let used = used.min(total);
        let free = total - used;
        Self {
            total,
            used,
            free,
            percent: percent_of(used, total),
            total_human: format_bytes(total),
            used_human: format_bytes(used),
            free_human: format_bytes(free),
        }
    }
}

/// Usage of one mounted disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskInfo {
    /// Mount point or device name.
    pub name: String,
    /// Total bytes.
    pub total: u64,
    /// Used bytes.
    pub used: u64,
    /// Free bytes.
    pub free: u64,
    /// Used fraction, 0-100.
    pub percent: f64,
    /// Human readable total.
    #[serde(default)]
    pub total_human: String,
    /// Human readable used.
    #[serde(default)]
    pub used_human: String,
    /// Human readable free.
    #[serde(default)]
    pub free_human: String,
}

impl DiskInfo {
    /// Build from total and available bytes.
    #[must_use]
    pub fn from_space(name: impl Into<String>, total: u64, available: u64) -> Self {
        let free = available.min(total);
        let used = total - free;
        Self {
            name: name.into(),
            total,
            used,
            free,
            percent: percent_of(used, total),
            total_human: format_bytes(total),
            used_human: format_bytes(used),
            free_human: format_bytes(free),
        }
    }
}

/// GPU memory in bytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GpuMemory {
    /// Total bytes.
    pub total: u64,
    /// Used bytes.
    pub used: u64,
    /// Free bytes.
    pub free: u64,
    /// Used fraction, 0-100.
    pub percent: f64,
    /// Human readable total.
    #[serde(default)]
    pub total_human: String,
    /// Human readable used.
    #[serde(default)]
    pub used_human: String,
}

impl GpuMemory {
    /// Build from MiB figures as reported by vendor tools.
    #[must_use]
    pub fn from_mib(total_mib: u64, used_mib: u64) -> Self {
        let total = total_mib * 1024 * 1024;
        let used = used_mib.min(total_mib) * 1024 * 1024;
        Self {
            total,
            used,
            free: total - used,
            percent: percent_of(used, total),
            total_human: format_bytes(total),
            used_human: format_bytes(used),
        }
    }
}

/// One GPU.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GpuInfo {
    /// Model name.
    pub name: String,
    /// Memory usage.
    pub memory: GpuMemory,
    /// Utilization, 0-100.
    pub utilization: f64,
    /// Temperature in Celsius.
    pub temperature: u32,
    /// Power draw in watts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_usage: Option<u32>,
    /// Power limit in watts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_limit: Option<u32>,
}

/// Counters for one network interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    /// Interface name.
    pub name: String,
    /// Bytes transmitted.
    pub bytes_sent: u64,
    /// Bytes received.
    pub bytes_recv: u64,
    /// Packets transmitted.
    pub packets_sent: u64,
    /// Packets received.
    pub packets_recv: u64,
    /// Receive errors.
    pub errors_in: u64,
    /// Transmit errors.
    pub errors_out: u64,
}

/// Render a byte count with binary units, e.g. `1.50 KB`.
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    const SUFFIXES: [char; 6] = ['K', 'M', 'G', 'T', 'P', 'E'];

    if bytes < UNIT {
        return format!("{:.2} B", bytes as f64);
    }

    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }

    format!("{:.2} {}B", bytes as f64 / div as f64, SUFFIXES[exp])
}

fn percent_of(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case(0, "0.00 B" ; "zero")]
    #[test_case(1023, "1023.00 B" ; "below one kib")]
    #[test_case(1024, "1.00 KB" ; "one kib")]
    #[test_case(1536, "1.50 KB" ; "fractional kib")]
    #[test_case(1024 * 1024, "1.00 MB" ; "one mib")]
    #[test_case(5 * 1024 * 1024 * 1024, "5.00 GB" ; "five gib")]
    #[test_case(u64::MAX, "16.00 EB" ; "max")]
    fn test_format_bytes(bytes: u64, expected: &str) {
        assert_eq!(format_bytes(bytes), expected);
    }

    #[test]
    fn test_memory_from_usage() {
        let mem = MemoryInfo::from_usage(1000, 250);
        assert_eq!(mem.free, 750);
        assert!((mem.percent - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_memory_used_clamped_to_total() {
        let mem = MemoryInfo::from_usage(100, 500);
        assert_eq!(mem.used, 100);
        assert_eq!(mem.free, 0);
    }

    #[test]
    fn test_disk_zero_total() {
        let disk = DiskInfo::from_space("/", 0, 0);
        assert!(disk.percent.abs() < f64::EPSILON);
    }

    #[test]
    fn test_gpu_memory_from_mib() {
        let mem = GpuMemory::from_mib(8192, 2048);
        assert_eq!(mem.total, 8192 * 1024 * 1024);
        assert!((mem.percent - 25.0).abs() < 1e-9);
        assert_eq!(mem.total_human, "8.00 GB");
    }

    #[test]
    fn test_snapshot_minimal_json() {
        let json = r#"{"hostname":"h","os":"linux","cpu":{"brand":"x","percent":1.0,"threads":2},
            "memory":{"total":1,"used":1,"free":0,"percent":100.0},"uptime":42}"#;
        let snap: SystemSnapshot = serde_json::from_str(json).unwrap();

        assert_eq!(snap.uptime, 42);
        assert!(snap.disks.is_empty());
        assert!(!snap.has_gpu());
        assert_eq!(snap.ws_clients, 0);
    }

    #[test]
    fn test_snapshot_omits_empty_gpu() {
        let snap = SystemSnapshot::default().with_ws_clients(3);
        let value = serde_json::to_value(&snap).unwrap();

        assert!(value.get("gpu").is_none());
        assert!(value.get("distro").is_none());
        assert_eq!(value["ws_clients"], 3);
    }

    proptest! {
        #[test]
        fn disk_used_plus_free_is_total(total in 0u64..u64::MAX / 2, avail in 0u64..u64::MAX / 2) {
            let disk = DiskInfo::from_space("d", total, avail);
            prop_assert_eq!(disk.used + disk.free, total);
            prop_assert!(disk.percent >= 0.0 && disk.percent <= 100.0);
        }
    }
}
