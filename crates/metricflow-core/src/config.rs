//! Configuration module for MetricFlow.
//!
//! Provides the typed configuration the host hands to `initialize`, with
//! defaults, validation, a builder for programmatic use, and optional YAML
//! loading for hosts that keep SDK settings in a file.
//!
//! The configuration is constructed once before `initialize` and never
//! mutated afterwards; the orchestrator takes ownership of it for the
//! lifetime of the installed system.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Upper bound for the sampling interval: 5 minutes.
pub const MAX_SAMPLE_INTERVAL_MS: u64 = 300_000;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for the MetricFlow SDK.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricFlowConfig {
    pub modules: ModuleToggles,
    pub sampler: SamplerConfig,
}

/// Per-module enable switches. Everything is on by default so an
/// all-defaults configuration activates the full monitoring set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleToggles {
    /// Install the panic hook and hang watchdog.
    pub crash_monitoring: bool,
    /// Log cold-start duration up to the first resumed surface.
    pub startup_tracking: bool,
    /// Run the periodic memory-pressure sampler.
    pub memory_sampling: bool,
    /// Record the current foreground surface in crash reports.
    pub screenshot_capture: bool,
    /// Time the host's HTTP requests.
    pub network_observer: bool,
    /// Tail the system log for warn/error lines.
    pub log_capture: bool,
    /// Log battery level / charging / health events.
    pub battery_monitoring: bool,
    /// Log network transport changes.
    pub connectivity_monitoring: bool,
    /// Log per-second frame throughput and janky frames.
    pub frame_observation: bool,
    /// Emit a one-shot host and OS description at install.
    pub device_info: bool,
}

impl Default for ModuleToggles {
    fn default() -> Self {
        Self {
            crash_monitoring: true,
            startup_tracking: true,
            memory_sampling: true,
            screenshot_capture: true,
            network_observer: true,
            log_capture: true,
            battery_monitoring: true,
            connectivity_monitoring: true,
            frame_observation: true,
            device_info: true,
        }
    }
}

/// Tuning for the periodic memory sampler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Milliseconds between memory samples. Must be > 0 and at most
    /// [`MAX_SAMPLE_INTERVAL_MS`].
    pub sample_interval_ms: u64,
    /// Process PSS (in KB) at or above which a sample is classified as
    /// low-memory, independent of the host's own signal.
    pub low_memory_threshold_kb: u64,
    /// Write a heap dump when a sample or trim notification is classified
    /// as low-memory.
    pub heap_dump_on_low_memory: bool,
    /// Log every sample (at debug level) in addition to invoking listeners.
    pub log_samples: bool,
    /// Directory for heap dumps. `None` falls back to the host cache dir.
    pub heap_dump_dir: Option<PathBuf>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 5_000,
            // 50 MB expressed in KB.
            low_memory_threshold_kb: 50 * 1024,
            heap_dump_on_low_memory: false,
            log_samples: true,
            heap_dump_dir: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl MetricFlowConfig {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: MetricFlowConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`MetricFlowConfig::default`]
    /// on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/metricflow/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("metricflow")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sampler.sample_interval_ms"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl MetricFlowConfig {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid. The threshold is a
    /// `u64`, so the non-negativity invariant holds by construction; only
    /// the interval bounds need runtime checks.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.sampler.sample_interval_ms == 0 {
            errors.push(ValidationError {
                field: "sampler.sample_interval_ms".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.sampler.sample_interval_ms > MAX_SAMPLE_INTERVAL_MS {
            errors.push(ValidationError {
                field: "sampler.sample_interval_ms".into(),
                message: format!("must not exceed 5 minutes ({MAX_SAMPLE_INTERVAL_MS} ms)"),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for [`MetricFlowConfig`], for hosts that configure the SDK in
/// code rather than from a file.
#[derive(Debug, Clone, Default)]
pub struct MetricFlowConfigBuilder {
    config: MetricFlowConfig,
}

impl MetricFlowConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn crash_monitoring(mut self, enabled: bool) -> Self {
        self.config.modules.crash_monitoring = enabled;
        self
    }

    pub fn startup_tracking(mut self, enabled: bool) -> Self {
        self.config.modules.startup_tracking = enabled;
        self
    }

    pub fn memory_sampling(mut self, enabled: bool) -> Self {
        self.config.modules.memory_sampling = enabled;
        self
    }

    pub fn screenshot_capture(mut self, enabled: bool) -> Self {
        self.config.modules.screenshot_capture = enabled;
        self
    }

    pub fn network_observer(mut self, enabled: bool) -> Self {
        self.config.modules.network_observer = enabled;
        self
    }

    pub fn log_capture(mut self, enabled: bool) -> Self {
        self.config.modules.log_capture = enabled;
        self
    }

    pub fn battery_monitoring(mut self, enabled: bool) -> Self {
        self.config.modules.battery_monitoring = enabled;
        self
    }

    pub fn connectivity_monitoring(mut self, enabled: bool) -> Self {
        self.config.modules.connectivity_monitoring = enabled;
        self
    }

    pub fn frame_observation(mut self, enabled: bool) -> Self {
        self.config.modules.frame_observation = enabled;
        self
    }

    pub fn device_info(mut self, enabled: bool) -> Self {
        self.config.modules.device_info = enabled;
        self
    }

    pub fn sample_interval_ms(mut self, ms: u64) -> Self {
        self.config.sampler.sample_interval_ms = ms;
        self
    }

    pub fn low_memory_threshold_kb(mut self, kb: u64) -> Self {
        self.config.sampler.low_memory_threshold_kb = kb;
        self
    }

    pub fn heap_dump_on_low_memory(mut self, enabled: bool) -> Self {
        self.config.sampler.heap_dump_on_low_memory = enabled;
        self
    }

    pub fn log_samples(mut self, enabled: bool) -> Self {
        self.config.sampler.log_samples = enabled;
        self
    }

    pub fn heap_dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.sampler.heap_dump_dir = Some(dir.into());
        self
    }

    /// Build without validating.
    pub fn build(self) -> MetricFlowConfig {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<MetricFlowConfig, Vec<ValidationError>> {
        let config = self.config;
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}
