//! MetricFlow Observers - peripheral monitor modules
//!
//! Simple single-purpose adapters installed and released through the same
//! `MonitorModule` contract as the core monitors:
//!
//! - [`BatteryObserver`] / [`ConnectivityObserver`] - log events from the
//!   host's optional peripheral feeds; install as no-ops when a feed is
//!   absent
//! - [`FrameObserver`] - per-second frame throughput and jank counting from
//!   the host's optional frame feed
//! - [`NetworkObserver`] - per-client-kind request timing via
//!   [`RequestTimer`]
//! - [`LogTailObserver`] - tails a subprocess's output for warning and
//!   error lines
//! - [`StartupTracker`] - logs the cold-start duration on the first
//!   foreground resume
//! - [`DeviceInfoCollector`] - one-shot host/OS info line at install

pub mod battery;
pub mod connectivity;
pub mod device_info;
pub mod frames;
pub mod logtail;
pub mod network;
pub mod startup;

pub use battery::BatteryObserver;
pub use connectivity::ConnectivityObserver;
pub use device_info::{DeviceInfoCollector, HostInfo};
pub use frames::{FrameObserver, FrameReport};
pub use logtail::LogTailObserver;
pub use network::{NetworkClientKind, NetworkObserver, RequestTimer};
pub use startup::StartupTracker;
