//! GPU metrics via vendor command line tools.
//!
//! Only NVIDIA is supported, through `nvidia-smi`. Hosts without the tool
//! simply report no GPUs.

use std::process::Command;

use pulse_proto::{GpuInfo, GpuMemory};
use tracing::debug;

use crate::error::{CollectError, CollectResult};

const QUERY: &str =
    "--query-gpu=name,utilization.gpu,temperature.gpu,power.draw,power.limit,memory.total,memory.used";

/// Reads current GPU metrics.
///
/// Blocking; callers run it off the async executor.
pub trait GpuReader: Send + Sync {
    /// Read metrics for every GPU.
    ///
    /// # Errors
    ///
    /// Returns an error if the vendor tool is missing or its output is unreadable.
    fn read(&self) -> CollectResult<Vec<GpuInfo>>;
}

/// `nvidia-smi` backed reader.
#[derive(Debug, Default, Clone)]
pub struct NvidiaSmi {
    path: Option<String>,
}

impl NvidiaSmi {
    /// Reader using `nvidia-smi` from `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reader using a specific binary.
    #[must_use]
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    fn binary(&self) -> &str {
        self.path.as_deref().unwrap_or("nvidia-smi")
    }

    /// Parse `--format=csv,noheader,nounits` output of the metrics query.
    ///
    /// Malformed lines are skipped. `[N/A]` power figures become `None`.
    pub fn parse_csv(output: &str) -> Vec<GpuInfo> {
        output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter_map(parse_line)
            .collect()
    }
}

fn parse_line(line: &str) -> Option<GpuInfo> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() < 7 {
        debug!(line, "skipping malformed nvidia-smi line");
        return None;
    }

    let utilization = fields[1].parse::<f64>().unwrap_or(0.0);
    let temperature = fields[2].parse::<u32>().unwrap_or(0);
    let power_usage = parse_watts(fields[3]);
    let power_limit = parse_watts(fields[4]);
    let total_mib = fields[5].parse::<u64>().ok()?;
    let used_mib = fields[6].parse::<u64>().unwrap_or(0);

    Some(GpuInfo {
        name: fields[0].to_string(),
        memory: GpuMemory::from_mib(total_mib, used_mib),
        utilization,
        temperature,
        power_usage,
        power_limit,
    })
}

fn parse_watts(field: &str) -> Option<u32> {
    field.parse::<f64>().ok().map(|w| w.round() as u32)
}

impl GpuReader for NvidiaSmi {
    fn read(&self) -> CollectResult<Vec<GpuInfo>> {
        let output = Command::new(self.binary())
            .args([QUERY, "--format=csv,noheader,nounits"])
            .output()
            .map_err(|e| CollectError::Gpu(format!("failed to run nvidia-smi: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CollectError::Gpu(format!("nvidia-smi failed: {stderr}")));
        }

        let stdout = String::from_utf8(output.stdout)
            .map_err(|e| CollectError::Gpu(format!("invalid nvidia-smi output: {e}")))?;
        Ok(Self::parse_csv(&stdout))
    }
}
