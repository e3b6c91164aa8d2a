//! Optional peripheral event feeds (battery, connectivity, frame timing)
//!
//! Not every host has these: a headless service has no battery and a test
//! harness has no network stack or render loop. [`IHostContext`](super::IHostContext)
//! therefore exposes them as `Option`s, and the corresponding observers
//! install as warned no-ops when a feed is absent.

use std::sync::Arc;
use std::time::Duration;

/// Reported battery condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryHealth {
    Good,
    Overheat,
    Dead,
    OverVoltage,
    Failure,
    Cold,
    Unknown,
}

impl std::fmt::Display for BatteryHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BatteryHealth::Good => "Good",
            BatteryHealth::Overheat => "Overheat",
            BatteryHealth::Dead => "Dead",
            BatteryHealth::OverVoltage => "Over Voltage",
            BatteryHealth::Failure => "Failure",
            BatteryHealth::Cold => "Cold",
            BatteryHealth::Unknown => "Unknown",
        };
        write!(f, "{}", s)
    }
}

/// A battery state change pushed by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryStatus {
    /// Charge percentage, or -1 when the host cannot determine it.
    pub percent: i32,
    pub charging: bool,
    pub health: BatteryHealth,
    /// Temperature in degrees Celsius.
    pub temperature_c: f32,
}

pub trait IPowerObserver: Send + Sync {
    fn on_battery_changed(&self, status: &BatteryStatus);
}

pub trait IPowerEvents: Send + Sync {
    fn register(&self, observer: Arc<dyn IPowerObserver>);
    fn unregister(&self, observer: &Arc<dyn IPowerObserver>) -> bool;
}

/// Physical transport of a network link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Wifi,
    Cellular,
    Ethernet,
    Vpn,
    Bluetooth,
    Unknown,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransportKind::Wifi => "WiFi",
            TransportKind::Cellular => "Cellular",
            TransportKind::Ethernet => "Ethernet",
            TransportKind::Vpn => "VPN",
            TransportKind::Bluetooth => "Bluetooth",
            TransportKind::Unknown => "Unknown",
        };
        write!(f, "{}", s)
    }
}

/// Capabilities of a network link as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkStatus {
    pub transport: TransportKind,
    pub has_internet: bool,
    pub validated: bool,
    pub metered: bool,
    /// Estimated downstream bandwidth, when the host can measure it.
    pub downlink_kbps: Option<u32>,
}

pub trait IConnectivityObserver: Send + Sync {
    fn on_link_available(&self, status: &LinkStatus);
    fn on_link_lost(&self);
    fn on_link_changed(&self, status: &LinkStatus);
}

pub trait IConnectivityEvents: Send + Sync {
    fn register(&self, observer: Arc<dyn IConnectivityObserver>);
    fn unregister(&self, observer: &Arc<dyn IConnectivityObserver>) -> bool;
}

/// Receives per-frame render timings from the host's frame pacing source.
///
/// The host calls this once per presented frame, from whatever thread its
/// render loop runs on.
pub trait IFrameObserver: Send + Sync {
    fn on_frame_rendered(&self, duration: Duration);
}

pub trait IFrameEvents: Send + Sync {
    fn register(&self, observer: Arc<dyn IFrameObserver>);
    fn unregister(&self, observer: &Arc<dyn IFrameObserver>) -> bool;
}
