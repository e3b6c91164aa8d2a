//! MetricFlow - in-process telemetry SDK
//!
//! Observes crashes (panics), UI responsiveness (main-context hangs),
//! memory pressure, and network activity inside a host application, and
//! reports everything through structured `tracing` logs. Nothing is
//! persisted or uploaded.
//!
//! # Usage
//!
//! The host implements the port traits in [`metricflow_core::ports`]
//! (lifecycle events, a main-context executor, a memory probe), then:
//!
//! ```no_run
//! use std::sync::Arc;
//! use metricflow::{MetricFlow, MetricFlowConfigBuilder};
//! # fn host_context() -> Arc<dyn metricflow::ports::IHostContext> { unimplemented!() }
//!
//! let config = MetricFlowConfigBuilder::new()
//!     .sample_interval_ms(10_000)
//!     .heap_dump_on_low_memory(true)
//!     .build();
//!
//! let sdk = MetricFlow::new();
//! sdk.initialize(host_context(), config).unwrap();
//! // ... process lifetime ...
//! sdk.release();
//! ```
//!
//! `initialize` is idempotent, installs each enabled module with
//! per-module failure isolation, and only ever fails on an invalid
//! configuration. `release` tears modules down in reverse install order.

pub mod logging;
pub mod orchestrator;

pub use orchestrator::{InitError, MetricFlow, OrchestratorState};

pub use metricflow_core::config::{
    MetricFlowConfig, MetricFlowConfigBuilder, ModuleToggles, SamplerConfig, ValidationError,
};
pub use metricflow_core::module::{ModuleError, MonitorModule};
pub use metricflow_core::ports;
pub use metricflow_core::snapshot::{MemorySnapshot, TrimLevel};
pub use metricflow_monitors::{ProcfsMemoryProbe, SamplerListener};
pub use metricflow_observers::{FrameReport, NetworkClientKind, RequestTimer};
