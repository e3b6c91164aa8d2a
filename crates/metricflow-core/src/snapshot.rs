//! Domain values produced by the memory sampler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An immutable point-in-time measurement of process and system memory.
///
/// Produced fresh on every sampler tick and on every on-demand probe; it
/// has no identity beyond its timestamp. The PSS breakdown mirrors what
/// `/proc/self/smaps_rollup` reports: anonymous, file-backed, and shared
/// mappings, summed into `total_pss_kb`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub timestamp: DateTime<Utc>,
    /// Proportional set size of the whole process, in KB.
    pub total_pss_kb: u64,
    pub anon_pss_kb: u64,
    pub file_pss_kb: u64,
    pub shmem_pss_kb: u64,
    /// Allocator-level heap usage, in bytes.
    pub heap_used_bytes: u64,
    pub heap_free_bytes: u64,
    pub heap_total_bytes: u64,
    /// System-wide available and total memory, in bytes.
    pub avail_mem_bytes: u64,
    pub total_mem_bytes: u64,
    /// Whether this sample was classified as memory pressure: the host
    /// reported low memory, or `total_pss_kb` reached `threshold_kb`.
    pub low_memory: bool,
    /// The configured PSS threshold (KB) used for the classification above.
    pub threshold_kb: u64,
}

/// Graded memory-pressure severity pushed by the host.
///
/// More granular than the legacy binary low-memory signal. Ordering follows
/// severity: `RunningModerate` is the mildest, `Complete` the harshest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrimLevel {
    /// The process is running and the system is moderately short on memory.
    RunningModerate,
    /// The system is running low; releasing caches would help.
    RunningLow,
    /// The system is critically low; the process may be killed soon.
    RunningCritical,
    /// The UI is no longer visible.
    UiHidden,
    /// The process is backgrounded and on the reclaim list.
    Background,
    /// The process is in the middle of the reclaim list.
    Moderate,
    /// The process is first in line to be killed.
    Complete,
}

impl TrimLevel {
    /// Numeric severity compatible with the host's trim constants.
    pub fn severity(self) -> u8 {
        match self {
            TrimLevel::RunningModerate => 5,
            TrimLevel::RunningLow => 10,
            TrimLevel::RunningCritical => 15,
            TrimLevel::UiHidden => 20,
            TrimLevel::Background => 40,
            TrimLevel::Moderate => 60,
            TrimLevel::Complete => 80,
        }
    }

    /// Whether this level is at or above the critical cutoff that
    /// justifies expensive diagnostics such as heap dumps.
    pub fn is_severe(self) -> bool {
        self >= TrimLevel::RunningCritical
    }
}

impl std::fmt::Display for TrimLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TrimLevel::RunningModerate => "running_moderate",
            TrimLevel::RunningLow => "running_low",
            TrimLevel::RunningCritical => "running_critical",
            TrimLevel::UiHidden => "ui_hidden",
            TrimLevel::Background => "background",
            TrimLevel::Moderate => "moderate",
            TrimLevel::Complete => "complete",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering_matches_variant_ordering() {
        assert!(TrimLevel::RunningModerate < TrimLevel::RunningLow);
        assert!(TrimLevel::RunningLow < TrimLevel::RunningCritical);
        assert!(TrimLevel::RunningCritical < TrimLevel::Complete);
        assert!(TrimLevel::RunningModerate.severity() < TrimLevel::Complete.severity());
    }

    #[test]
    fn severe_cutoff_is_running_critical() {
        assert!(!TrimLevel::RunningModerate.is_severe());
        assert!(!TrimLevel::RunningLow.is_severe());
        assert!(TrimLevel::RunningCritical.is_severe());
        assert!(TrimLevel::UiHidden.is_severe());
        assert!(TrimLevel::Complete.is_severe());
    }

    #[test]
    fn snapshot_serializes_to_json() {
        let snapshot = MemorySnapshot {
            timestamp: Utc::now(),
            total_pss_kb: 1024,
            anon_pss_kb: 512,
            file_pss_kb: 384,
            shmem_pss_kb: 128,
            heap_used_bytes: 1 << 20,
            heap_free_bytes: 1 << 19,
            heap_total_bytes: (1 << 20) + (1 << 19),
            avail_mem_bytes: 4 << 30,
            total_mem_bytes: 8 << 30,
            low_memory: false,
            threshold_kb: 51_200,
        };

        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"total_pss_kb\":1024"));
        assert!(json.contains("\"low_memory\":false"));
    }
}
