//! Battery event observer
//!
//! Logs battery state changes from the host's optional power feed. A host
//! without one (headless service, test harness) gets a warned no-op
//! install.

use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use metricflow_core::module::{ModuleError, MonitorModule};
use metricflow_core::ports::{BatteryStatus, IHostContext, IPowerEvents, IPowerObserver};

const TARGET: &str = "metricflow::battery";

pub struct BatteryObserver {
    inner: Arc<BatteryInner>,
}

struct BatteryInner {
    installed: Mutex<bool>,
    events: Mutex<Option<Arc<dyn IPowerEvents>>>,
}

impl BatteryObserver {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BatteryInner {
                installed: Mutex::new(false),
                events: Mutex::new(None),
            }),
        }
    }
}

impl Default for BatteryObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorModule for BatteryObserver {
    fn name(&self) -> &'static str {
        "battery_observer"
    }

    fn install(&self, host: &Arc<dyn IHostContext>) -> Result<(), ModuleError> {
        {
            let mut installed = self.inner.installed.lock().unwrap_or_else(|e| e.into_inner());
            if *installed {
                warn!(target: TARGET, "battery observer already installed, skipping");
                return Ok(());
            }
            *installed = true;
        }

        let Some(events) = host.power_events() else {
            warn!(target: TARGET, "host has no power feed, battery observer idle");
            return Ok(());
        };

        events.register(Arc::clone(&self.inner) as Arc<dyn IPowerObserver>);
        *self.inner.events.lock().unwrap_or_else(|e| e.into_inner()) = Some(events);
        debug!(target: TARGET, "battery observer installed");
        Ok(())
    }

    fn release(&self) {
        {
            let mut installed = self.inner.installed.lock().unwrap_or_else(|e| e.into_inner());
            if !*installed {
                return;
            }
            *installed = false;
        }

        if let Some(events) = self.inner.events.lock().unwrap_or_else(|e| e.into_inner()).take() {
            let observer = Arc::clone(&self.inner) as Arc<dyn IPowerObserver>;
            if !events.unregister(&observer) {
                debug!(target: TARGET, "power observer already unregistered");
            }
        }
        debug!(target: TARGET, "battery observer released");
    }
}

impl IPowerObserver for BatteryInner {
    fn on_battery_changed(&self, status: &BatteryStatus) {
        info!(
            target: TARGET,
            percent = status.percent,
            charging = status.charging,
            health = %status.health,
            temperature_c = status.temperature_c,
            "battery status changed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metricflow_core::ports::{
        ILifecycleEvents, IMainExecutor, IMemoryPressureEvents, IMemoryProbe,
    };
    use std::path::PathBuf;

    struct RecordingPowerEvents {
        observers: Mutex<Vec<Arc<dyn IPowerObserver>>>,
    }

    impl IPowerEvents for RecordingPowerEvents {
        fn register(&self, observer: Arc<dyn IPowerObserver>) {
            self.observers.lock().unwrap().push(observer);
        }

        fn unregister(&self, observer: &Arc<dyn IPowerObserver>) -> bool {
            let mut observers = self.observers.lock().unwrap();
            let before = observers.len();
            observers.retain(|o| !Arc::ptr_eq(o, observer));
            observers.len() < before
        }
    }

    struct HostWithPower {
        power: Arc<RecordingPowerEvents>,
    }

    struct HostWithoutPower;

    macro_rules! unsupported_host_surface {
        () => {
            fn cache_dir(&self) -> PathBuf {
                std::env::temp_dir()
            }
            fn main_executor(&self) -> Arc<dyn IMainExecutor> {
                unimplemented!("not used by battery tests")
            }
            fn lifecycle_events(&self) -> Arc<dyn ILifecycleEvents> {
                unimplemented!("not used by battery tests")
            }
            fn memory_pressure_events(&self) -> Arc<dyn IMemoryPressureEvents> {
                unimplemented!("not used by battery tests")
            }
            fn memory_probe(&self) -> Arc<dyn IMemoryProbe> {
                unimplemented!("not used by battery tests")
            }
        };
    }

    impl IHostContext for HostWithPower {
        unsupported_host_surface!();

        fn power_events(&self) -> Option<Arc<dyn IPowerEvents>> {
            Some(Arc::clone(&self.power) as Arc<dyn IPowerEvents>)
        }
    }

    impl IHostContext for HostWithoutPower {
        unsupported_host_surface!();
    }

    #[test]
    fn installs_and_registers_when_feed_present() {
        let power = Arc::new(RecordingPowerEvents {
            observers: Mutex::new(Vec::new()),
        });
        let host: Arc<dyn IHostContext> = Arc::new(HostWithPower {
            power: Arc::clone(&power),
        });

        let observer = BatteryObserver::new();
        observer.install(&host).unwrap();
        assert_eq!(power.observers.lock().unwrap().len(), 1);

        observer.release();
        assert!(power.observers.lock().unwrap().is_empty());
    }

    #[test]
    fn missing_feed_is_a_successful_noop() {
        let host: Arc<dyn IHostContext> = Arc::new(HostWithoutPower);
        let observer = BatteryObserver::new();
        observer.install(&host).unwrap();
        observer.release();
    }

    #[test]
    fn double_install_registers_once() {
        let power = Arc::new(RecordingPowerEvents {
            observers: Mutex::new(Vec::new()),
        });
        let host: Arc<dyn IHostContext> = Arc::new(HostWithPower {
            power: Arc::clone(&power),
        });

        let observer = BatteryObserver::new();
        observer.install(&host).unwrap();
        observer.install(&host).unwrap();
        assert_eq!(power.observers.lock().unwrap().len(), 1);
    }
}
