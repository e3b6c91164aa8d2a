//! Port definitions (hexagonal architecture interfaces)
//!
//! These traits form the boundary between the SDK and the embedding host.
//! The host implements them once; the monitor modules consume them without
//! knowing anything about the host's UI toolkit or platform.
//!
//! ## Ports Overview
//!
//! - [`IHostContext`] - Aggregate handle passed to every module's `install`
//! - [`IMainExecutor`] - Posts work onto the host's primary execution context
//! - [`ILifecycleEvents`] - Foreground-surface resume/pause notifications
//! - [`IMemoryPressureEvents`] - Graded trim + legacy low-memory signals
//! - [`IMemoryProbe`] - Process/system memory introspection and heap dumps
//! - [`IPowerEvents`] / [`IConnectivityEvents`] / [`IFrameEvents`] - Optional
//!   peripheral feeds
//!
//! All ports are synchronous: they are invoked either from the SDK's own
//! dedicated threads or from whatever thread the host dispatches its
//! callbacks on. No port implementation may assume a particular caller
//! thread.

pub mod feeds;
pub mod host;
pub mod lifecycle;
pub mod memory;

pub use feeds::{
    BatteryHealth, BatteryStatus, IConnectivityEvents, IConnectivityObserver, IFrameEvents,
    IFrameObserver, IPowerEvents, IPowerObserver, LinkStatus, TransportKind,
};
pub use host::{IHostContext, IMainExecutor};
pub use lifecycle::{IForegroundSurface, ILifecycleEvents, ILifecycleObserver};
pub use memory::{
    HeapUsage, IMemoryPressureEvents, IMemoryPressureObserver, IMemoryProbe, ProbeError,
    ProcessPss, SystemMemory,
};
