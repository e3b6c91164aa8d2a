//! Host context port (driven/secondary port)
//!
//! The aggregate handle the orchestrator passes to every module's
//! `install`. It bundles the individual host surfaces so the module set
//! can grow without changing the `MonitorModule` signature.
//!
//! ## Design Notes
//!
//! - The peripheral feeds are optional: a headless or test host simply
//!   returns `None` and the corresponding observers install as no-ops.
//! - `IMainExecutor::post` must be non-blocking and safe to call from any
//!   thread; the watchdog calls it from its own dedicated thread at a
//!   steady cadence.

use std::path::PathBuf;
use std::sync::Arc;

use super::feeds::{IConnectivityEvents, IFrameEvents, IPowerEvents};
use super::lifecycle::ILifecycleEvents;
use super::memory::{IMemoryPressureEvents, IMemoryProbe};

/// Executes posted jobs on the host's primary (UI) execution context.
///
/// The watchdog uses this to probe responsiveness: a healthy primary
/// context runs posted jobs promptly; a hung one never gets to them.
pub trait IMainExecutor: Send + Sync {
    /// Enqueue `job` for execution on the primary context. Must not block.
    fn post(&self, job: Box<dyn FnOnce() + Send + 'static>);
}

/// The embedding application, as seen by the SDK.
pub trait IHostContext: Send + Sync {
    /// Directory for SDK artifacts (heap dumps) when none is configured.
    fn cache_dir(&self) -> PathBuf;

    /// Handle to the primary execution context's queue.
    fn main_executor(&self) -> Arc<dyn IMainExecutor>;

    /// Foreground-surface lifecycle notifications.
    fn lifecycle_events(&self) -> Arc<dyn ILifecycleEvents>;

    /// Memory-pressure notifications (trim levels + legacy low-memory).
    fn memory_pressure_events(&self) -> Arc<dyn IMemoryPressureEvents>;

    /// Memory introspection and heap-dump support.
    fn memory_probe(&self) -> Arc<dyn IMemoryProbe>;

    /// Battery event feed, if this host has one.
    fn power_events(&self) -> Option<Arc<dyn IPowerEvents>> {
        None
    }

    /// Connectivity event feed, if this host has one.
    fn connectivity_events(&self) -> Option<Arc<dyn IConnectivityEvents>> {
        None
    }

    /// Frame timing feed, if this host drives a render loop.
    fn frame_events(&self) -> Option<Arc<dyn IFrameEvents>> {
        None
    }
}
