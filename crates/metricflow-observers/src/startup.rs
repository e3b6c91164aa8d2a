//! Cold-start duration tracking
//!
//! Measures the time from SDK construction to the first foreground resume
//! and logs it exactly once. Subsequent resumes are ignored.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use metricflow_core::module::{ModuleError, MonitorModule};
use metricflow_core::ports::IHostContext;
use metricflow_monitors::ActivityTracker;

const TARGET: &str = "metricflow::startup";

pub struct StartupTracker {
    inner: Arc<StartupInner>,
    activity: Arc<ActivityTracker>,
    installed: Mutex<bool>,
}

struct StartupInner {
    origin: Instant,
    fired: AtomicBool,
    recorded: Mutex<Option<Duration>>,
}

impl StartupTracker {
    /// `origin` is when measurement begins; callers construct this as early
    /// in process start as they can.
    pub fn new(activity: Arc<ActivityTracker>) -> Self {
        Self {
            inner: Arc::new(StartupInner {
                origin: Instant::now(),
                fired: AtomicBool::new(false),
                recorded: Mutex::new(None),
            }),
            activity,
            installed: Mutex::new(false),
        }
    }

    /// The measured cold-start duration, once the first resume has landed.
    pub fn startup_duration(&self) -> Option<Duration> {
        *self.inner.recorded.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl MonitorModule for StartupTracker {
    fn name(&self) -> &'static str {
        "startup_tracker"
    }

    fn install(&self, _host: &Arc<dyn IHostContext>) -> Result<(), ModuleError> {
        {
            let mut installed = self.installed.lock().unwrap_or_else(|e| e.into_inner());
            if *installed {
                warn!(target: TARGET, "startup tracker already installed, skipping");
                return Ok(());
            }
            *installed = true;
        }

        let inner = Arc::clone(&self.inner);
        self.activity.add_on_resumed_listener(Arc::new(move |surface| {
            // First resume only.
            if inner.fired.swap(true, Ordering::SeqCst) {
                return;
            }
            let elapsed = inner.origin.elapsed();
            *inner.recorded.lock().unwrap_or_else(|e| e.into_inner()) = Some(elapsed);
            info!(
                target: TARGET,
                duration_ms = elapsed.as_millis() as u64,
                surface = surface.name(),
                "cold start completed"
            );
        }));

        debug!(target: TARGET, "startup tracker installed");
        Ok(())
    }

    fn release(&self) {
        let mut installed = self.installed.lock().unwrap_or_else(|e| e.into_inner());
        if !*installed {
            return;
        }
        *installed = false;
        // The listener stays parked in the tracker until the tracker itself
        // releases; the fired flag keeps it inert either way.
        debug!(target: TARGET, "startup tracker released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metricflow_core::ports::{
        IForegroundSurface, ILifecycleEvents, ILifecycleObserver, IMainExecutor,
        IMemoryPressureEvents, IMemoryProbe,
    };
    use std::path::PathBuf;

    struct LifecycleHub {
        observers: Mutex<Vec<Arc<dyn ILifecycleObserver>>>,
    }

    impl ILifecycleEvents for LifecycleHub {
        fn register(&self, observer: Arc<dyn ILifecycleObserver>) {
            self.observers.lock().unwrap().push(observer);
        }

        fn unregister(&self, observer: &Arc<dyn ILifecycleObserver>) -> bool {
            let mut observers = self.observers.lock().unwrap();
            let before = observers.len();
            observers.retain(|o| !Arc::ptr_eq(o, observer));
            observers.len() < before
        }
    }

    struct LifecycleHost {
        hub: Arc<LifecycleHub>,
    }

    impl IHostContext for LifecycleHost {
        fn cache_dir(&self) -> PathBuf {
            std::env::temp_dir()
        }
        fn main_executor(&self) -> Arc<dyn IMainExecutor> {
            unimplemented!("not used by startup tests")
        }
        fn lifecycle_events(&self) -> Arc<dyn ILifecycleEvents> {
            Arc::clone(&self.hub) as Arc<dyn ILifecycleEvents>
        }
        fn memory_pressure_events(&self) -> Arc<dyn IMemoryPressureEvents> {
            unimplemented!("not used by startup tests")
        }
        fn memory_probe(&self) -> Arc<dyn IMemoryProbe> {
            unimplemented!("not used by startup tests")
        }
    }

    struct TestSurface;
    impl IForegroundSurface for TestSurface {
        fn name(&self) -> &str {
            "Home"
        }
    }

    #[test]
    fn first_resume_records_duration_exactly_once() {
        let hub = Arc::new(LifecycleHub {
            observers: Mutex::new(Vec::new()),
        });
        let host: Arc<dyn IHostContext> = Arc::new(LifecycleHost {
            hub: Arc::clone(&hub),
        });

        let activity = Arc::new(ActivityTracker::new());
        activity.install(&host).unwrap();

        let tracker = StartupTracker::new(Arc::clone(&activity));
        tracker.install(&host).unwrap();
        assert!(tracker.startup_duration().is_none());

        let surface: Arc<dyn IForegroundSurface> = Arc::new(TestSurface);
        for o in hub.observers.lock().unwrap().clone() {
            o.on_surface_resumed(&surface);
        }
        let first = tracker.startup_duration().expect("first resume must record");

        std::thread::sleep(Duration::from_millis(5));
        for o in hub.observers.lock().unwrap().clone() {
            o.on_surface_resumed(&surface);
        }
        assert_eq!(tracker.startup_duration(), Some(first));

        tracker.release();
        activity.release();
    }
}
