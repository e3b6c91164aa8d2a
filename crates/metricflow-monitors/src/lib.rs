//! MetricFlow Monitors - The background concurrency core
//!
//! The four monitor modules with real machinery behind them:
//! - [`HangWatchdog`] - dedicated thread probing the host's primary
//!   execution context for responsiveness
//! - [`MemorySampler`] - periodic memory-pressure snapshots with heap-dump
//!   offloading to a lazily-started worker thread
//! - [`ActivityTracker`] - non-owning tracking of the current foreground
//!   surface with a resumed-event fan-out
//! - [`CrashMonitor`] - panic-hook delegation chained onto the previously
//!   installed hook, backed by the watchdog
//!
//! Plus [`ProcfsMemoryProbe`], the default Linux implementation of the
//! `IMemoryProbe` port.
//!
//! # Threads
//!
//! Each module owns its threads outright: one watchdog thread, one sampling
//! thread, and one heap-dump worker created on first use. Nothing here
//! assumes an async runtime or a particular caller thread.

pub mod activity;
pub mod crash;
pub mod probe;
pub mod sampler;
pub mod watchdog;

#[cfg(test)]
pub(crate) mod testutil;

pub use activity::ActivityTracker;
pub use crash::CrashMonitor;
pub use probe::ProcfsMemoryProbe;
pub use sampler::{MemorySampler, SamplerListener};
pub use watchdog::HangWatchdog;
