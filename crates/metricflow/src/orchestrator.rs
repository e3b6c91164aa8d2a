//! Lifecycle orchestration
//!
//! [`MetricFlow`] owns the configuration and the module instances for the
//! lifetime between `initialize` and `release`. The module set is a
//! declarative ordered list built once per activation; install walks it
//! forward, release walks it backward, and neither loop knows anything
//! about individual modules.
//!
//! ## Guarantees
//!
//! - At-most-once activation: the state flag is test-and-set under one
//!   mutex before any work, so concurrent initializers race safely.
//! - Failure isolation: one module failing to install (or panicking) is
//!   logged and does not stop its siblings. The only error a host ever
//!   sees is an invalid configuration, which rolls the state back so the
//!   call can be retried.
//! - Release order is the exact reverse of install order, so dependents
//!   (crash monitor, startup tracker) release before the activity tracker
//!   they consume.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use metricflow_core::config::{MetricFlowConfig, ValidationError};
use metricflow_core::module::MonitorModule;
use metricflow_core::ports::IHostContext;
use metricflow_monitors::{ActivityTracker, CrashMonitor, HangWatchdog, MemorySampler};
use metricflow_observers::{
    BatteryObserver, ConnectivityObserver, DeviceInfoCollector, FrameObserver, LogTailObserver,
    NetworkClientKind, NetworkObserver, StartupTracker,
};

use crate::logging;

const TARGET: &str = "metricflow::orchestrator";

/// The only error `initialize` surfaces to the host.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("invalid configuration: {}", .errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    InvalidConfiguration { errors: Vec<ValidationError> },
}

/// Activation state of the SDK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Uninitialized,
    Installed,
}

/// The SDK entry point. One instance per process; all methods are callable
/// from any thread.
pub struct MetricFlow {
    state: Mutex<OrchestratorState>,
    /// Installed modules in install order. Emptied by `release`.
    modules: Mutex<Vec<Arc<dyn MonitorModule>>>,
    /// Handles retained for the host-facing accessors.
    activity: Mutex<Option<Arc<ActivityTracker>>>,
    sampler: Mutex<Option<Arc<MemorySampler>>>,
    /// Preassembled module set, for hosts (and tests) that bypass the
    /// config-driven assembly.
    fixed_modules: Option<Vec<Arc<dyn MonitorModule>>>,
}

impl MetricFlow {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(OrchestratorState::Uninitialized),
            modules: Mutex::new(Vec::new()),
            activity: Mutex::new(None),
            sampler: Mutex::new(None),
            fixed_modules: None,
        }
    }

    /// Orchestrate a caller-assembled module set instead of building one
    /// from the configuration toggles. The configuration is still
    /// validated; install/release order is the order of `modules`.
    pub fn with_modules(modules: Vec<Arc<dyn MonitorModule>>) -> Self {
        Self {
            fixed_modules: Some(modules),
            ..Self::new()
        }
    }

    /// Activate the SDK. Idempotent: a second call while installed is a
    /// warned no-op. An invalid configuration fails the call, installs
    /// nothing, and leaves the SDK retryable.
    pub fn initialize(
        &self,
        host: Arc<dyn IHostContext>,
        config: MetricFlowConfig,
    ) -> Result<(), InitError> {
        self.initialize_inner(host, config, None)
    }

    /// [`initialize`](Self::initialize), additionally naming the host's
    /// HTTP client stack so the network observer can attribute request
    /// timings.
    pub fn initialize_with_network_client(
        &self,
        host: Arc<dyn IHostContext>,
        config: MetricFlowConfig,
        client: NetworkClientKind,
    ) -> Result<(), InitError> {
        self.initialize_inner(host, config, Some(client))
    }

    fn initialize_inner(
        &self,
        host: Arc<dyn IHostContext>,
        config: MetricFlowConfig,
        client: Option<NetworkClientKind>,
    ) -> Result<(), InitError> {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if *state == OrchestratorState::Installed {
                warn!(target: TARGET, "metricflow already initialized, skipping");
                return Ok(());
            }
            // Flip before doing any work so concurrent callers lose the
            // race here instead of double-installing.
            *state = OrchestratorState::Installed;
        }

        let errors = config.validate();
        if !errors.is_empty() {
            // Roll back so a corrected configuration can be retried.
            *self.state.lock().unwrap_or_else(|e| e.into_inner()) =
                OrchestratorState::Uninitialized;
            return Err(InitError::InvalidConfiguration { errors });
        }

        logging::init_logging();

        let modules = match &self.fixed_modules {
            Some(fixed) => fixed.clone(),
            None => self.assemble_modules(&config, client),
        };

        let mut installed = 0;
        for module in &modules {
            match catch_unwind(AssertUnwindSafe(|| module.install(&host))) {
                Ok(Ok(())) => {
                    debug!(target: TARGET, module = module.name(), "module installed");
                    installed += 1;
                }
                Ok(Err(e)) => {
                    error!(
                        target: TARGET,
                        module = module.name(),
                        error = %e,
                        "module install failed, continuing with remaining modules"
                    );
                }
                Err(_) => {
                    error!(
                        target: TARGET,
                        module = module.name(),
                        "module install panicked, continuing with remaining modules"
                    );
                }
            }
        }

        *self.modules.lock().unwrap_or_else(|e| e.into_inner()) = modules;
        info!(target: TARGET, installed, "metricflow initialized");
        Ok(())
    }

    /// Deactivate the SDK, releasing modules in reverse install order.
    /// A release before any initialize is a warned no-op.
    pub fn release(&self) {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if *state == OrchestratorState::Uninitialized {
                warn!(target: TARGET, "metricflow not initialized, nothing to release");
                return;
            }
            *state = OrchestratorState::Uninitialized;
        }

        let modules = std::mem::take(&mut *self.modules.lock().unwrap_or_else(|e| e.into_inner()));
        for module in modules.iter().rev() {
            if catch_unwind(AssertUnwindSafe(|| module.release())).is_err() {
                error!(
                    target: TARGET,
                    module = module.name(),
                    "module release panicked, continuing with remaining modules"
                );
            } else {
                debug!(target: TARGET, module = module.name(), "module released");
            }
        }

        *self.activity.lock().unwrap_or_else(|e| e.into_inner()) = None;
        *self.sampler.lock().unwrap_or_else(|e| e.into_inner()) = None;
        info!(target: TARGET, "metricflow released");
    }

    pub fn state(&self) -> OrchestratorState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_installed(&self) -> bool {
        self.state() == OrchestratorState::Installed
    }

    /// The activity tracker, while installed. For registering resume
    /// listeners and looking up the current foreground surface.
    pub fn activity_tracker(&self) -> Option<Arc<ActivityTracker>> {
        self.activity.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// The memory sampler, while installed. For registering sampler
    /// listeners and on-demand probes.
    pub fn memory_sampler(&self) -> Option<Arc<MemorySampler>> {
        self.sampler.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Names of the active modules, in install order. Empty when released.
    pub fn module_names(&self) -> Vec<&'static str> {
        self.modules
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|m| m.name())
            .collect()
    }

    /// Build the ordered module list: dependency-first, so the activity
    /// tracker precedes its consumers and release (reverse order) tears
    /// consumers down first.
    fn assemble_modules(
        &self,
        config: &MetricFlowConfig,
        client: Option<NetworkClientKind>,
    ) -> Vec<Arc<dyn MonitorModule>> {
        let toggles = &config.modules;

        let activity = Arc::new(ActivityTracker::new());
        *self.activity.lock().unwrap_or_else(|e| e.into_inner()) = Some(Arc::clone(&activity));

        let mut modules: Vec<Arc<dyn MonitorModule>> =
            vec![Arc::clone(&activity) as Arc<dyn MonitorModule>];

        if toggles.device_info {
            modules.push(Arc::new(DeviceInfoCollector::new()));
        }
        if toggles.startup_tracking {
            modules.push(Arc::new(StartupTracker::new(Arc::clone(&activity))));
        }
        if toggles.crash_monitoring {
            modules.push(Arc::new(CrashMonitor::new(
                Arc::new(HangWatchdog::new()),
                Arc::clone(&activity),
                toggles.screenshot_capture,
            )));
        }
        if toggles.memory_sampling {
            let sampler = Arc::new(MemorySampler::new(config.sampler.clone()));
            *self.sampler.lock().unwrap_or_else(|e| e.into_inner()) = Some(Arc::clone(&sampler));
            modules.push(sampler);
        }
        if toggles.network_observer {
            // Hosts that never name their client stack still get request
            // timing, attributed to the default kind.
            modules.push(Arc::new(NetworkObserver::new(client.unwrap_or_default())));
        }
        if toggles.log_capture {
            modules.push(Arc::new(LogTailObserver::new()));
        }
        if toggles.battery_monitoring {
            modules.push(Arc::new(BatteryObserver::new()));
        }
        if toggles.connectivity_monitoring {
            modules.push(Arc::new(ConnectivityObserver::new()));
        }
        if toggles.frame_observation {
            modules.push(Arc::new(FrameObserver::new()));
        }

        modules
    }
}

impl Default for MetricFlow {
    fn default() -> Self {
        Self::new()
    }
}
