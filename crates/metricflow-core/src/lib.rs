//! MetricFlow Core - Domain types and host-integration ports
//!
//! This crate contains the SDK's hexagonal core with:
//! - **Configuration** - `MetricFlowConfig` with defaults, builder, validation
//! - **Domain values** - `MemorySnapshot`, `TrimLevel`
//! - **Module contract** - the `MonitorModule` capability every monitoring
//!   feature implements, consumed uniformly by the orchestrator
//! - **Port definitions** - Traits the embedding host implements:
//!   `IHostContext`, `IMainExecutor`, `ILifecycleEvents`,
//!   `IMemoryPressureEvents`, `IMemoryProbe`, and the optional
//!   `IPowerEvents` / `IConnectivityEvents` feeds
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! Nothing in here spawns threads or performs I/O; the monitor crates are
//! the adapters that drive these ports from their own execution contexts.

pub mod config;
pub mod module;
pub mod ports;
pub mod snapshot;

pub use config::{MetricFlowConfig, MetricFlowConfigBuilder, ValidationError};
pub use module::{ModuleError, MonitorModule};
pub use snapshot::{MemorySnapshot, TrimLevel};
