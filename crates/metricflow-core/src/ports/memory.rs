//! Memory introspection and pressure-notification ports
//!
//! Two distinct host surfaces live here:
//!
//! - [`IMemoryProbe`] is pull: the sampler asks for process PSS, allocator
//!   heap usage, and system memory on every tick, and asks it to write a
//!   heap dump when pressure warrants one.
//! - [`IMemoryPressureEvents`] is push: the host delivers graded trim
//!   notifications and the legacy binary low-memory signal to registered
//!   observers, on whatever thread it pleases.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::snapshot::TrimLevel;

/// Errors from memory introspection.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe read failed: {0}")]
    Io(#[from] std::io::Error),

    /// A stat source existed but could not be parsed.
    #[error("malformed {source_name}: {detail}")]
    Parse {
        source_name: &'static str,
        detail: String,
    },

    /// This probe cannot provide the requested measurement on this platform.
    #[error("unsupported on this platform: {0}")]
    Unsupported(&'static str),
}

/// Proportional set size of the current process, broken down by mapping
/// kind, all in KB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessPss {
    pub total_kb: u64,
    pub anon_kb: u64,
    pub file_kb: u64,
    pub shmem_kb: u64,
}

/// Allocator-level heap usage of the current process, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapUsage {
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub total_bytes: u64,
}

/// System-wide memory state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemMemory {
    pub avail_bytes: u64,
    pub total_bytes: u64,
    /// The host's own judgement that the system is low on memory,
    /// independent of any SDK-configured threshold.
    pub low_memory: bool,
}

/// Pull-style memory introspection.
pub trait IMemoryProbe: Send + Sync {
    fn process_pss(&self) -> Result<ProcessPss, ProbeError>;
    fn heap_usage(&self) -> Result<HeapUsage, ProbeError>;
    fn system_memory(&self) -> Result<SystemMemory, ProbeError>;

    /// Write a heap dump to `path`. Expected to be slow; callers must keep
    /// this off any latency-sensitive thread.
    fn dump_heap(&self, path: &Path) -> Result<(), ProbeError>;
}

/// Receives host-pushed memory-pressure notifications.
///
/// Callbacks must not block: the host may dispatch them on its primary
/// execution context.
pub trait IMemoryPressureObserver: Send + Sync {
    /// Graded trim signal.
    fn on_trim(&self, level: TrimLevel);

    /// Legacy binary low-memory signal.
    fn on_low_memory(&self);
}

/// Registration surface for memory-pressure notifications.
pub trait IMemoryPressureEvents: Send + Sync {
    fn register(&self, observer: Arc<dyn IMemoryPressureObserver>);

    /// Remove a previously registered observer. Removing an observer that
    /// was never registered returns `false` and is not an error.
    fn unregister(&self, observer: &Arc<dyn IMemoryPressureObserver>) -> bool;
}
