//! Host and OS information
//!
//! Gathers non-identifying system information and logs it once at install.
//! Never includes hostname or username.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use metricflow_core::module::{ModuleError, MonitorModule};
use metricflow_core::ports::IHostContext;

const TARGET: &str = "metricflow::device";

/// Non-identifying host information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostInfo {
    pub os: String,
    pub kernel: String,
    pub arch: String,
    pub cpu_count: usize,
}

impl HostInfo {
    /// Collect host information from the current system.
    pub fn collect() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            kernel: read_kernel_version(),
            arch: std::env::consts::ARCH.to_string(),
            cpu_count: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

fn read_kernel_version() -> String {
    std::fs::read_to_string("/proc/version")
        .ok()
        .and_then(|v| v.split_whitespace().nth(2).map(String::from))
        .unwrap_or_default()
}

/// One-shot module: logs a `HostInfo` line at install, nothing at release.
pub struct DeviceInfoCollector {
    installed: Mutex<bool>,
}

impl DeviceInfoCollector {
    pub fn new() -> Self {
        Self {
            installed: Mutex::new(false),
        }
    }
}

impl Default for DeviceInfoCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorModule for DeviceInfoCollector {
    fn name(&self) -> &'static str {
        "device_info_collector"
    }

    fn install(&self, _host: &Arc<dyn IHostContext>) -> Result<(), ModuleError> {
        let mut installed = self.installed.lock().unwrap_or_else(|e| e.into_inner());
        if *installed {
            warn!(target: TARGET, "device info collector already installed, skipping");
            return Ok(());
        }
        *installed = true;

        let info = HostInfo::collect();
        info!(
            target: TARGET,
            os = info.os.as_str(),
            kernel = info.kernel.as_str(),
            arch = info.arch.as_str(),
            cpu_count = info.cpu_count,
            "host info collected"
        );
        Ok(())
    }

    fn release(&self) {
        *self.installed.lock().unwrap_or_else(|e| e.into_inner()) = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_reports_current_platform() {
        let info = HostInfo::collect();
        assert_eq!(info.os, std::env::consts::OS);
        assert!(!info.arch.is_empty());
        assert!(info.cpu_count >= 1);
    }

    #[test]
    fn host_info_round_trips_through_json() {
        let info = HostInfo::collect();
        let json = serde_json::to_string(&info).unwrap();
        let loaded: HostInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.os, info.os);
        assert_eq!(loaded.cpu_count, info.cpu_count);
    }
}
