//! Activity tracking - best-effort "current foreground surface" lookup
//!
//! Tracks which host UI surface is in the foreground via the host's
//! lifecycle callbacks, and fans resume events out to registered
//! listeners. The tracker holds only a `Weak` reference to the surface:
//! it reports what is foregrounded but never keeps it alive, so callers
//! must treat an empty lookup as a normal, frequent case.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, Weak};

use tracing::{debug, error, warn};

use metricflow_core::module::{ModuleError, MonitorModule};
use metricflow_core::ports::{
    IForegroundSurface, IHostContext, ILifecycleEvents, ILifecycleObserver,
};

const TARGET: &str = "metricflow::activity";

/// Callback invoked with the surface that just resumed.
pub type ResumedListener = Arc<dyn Fn(&Arc<dyn IForegroundSurface>) + Send + Sync>;

/// Tracks the current foreground surface without owning it.
pub struct ActivityTracker {
    inner: Arc<TrackerInner>,
}

struct TrackerInner {
    installed: Mutex<bool>,
    /// Weak handle to the most recently resumed surface. `None` once that
    /// surface pauses or before anything has resumed.
    current: Mutex<Option<Weak<dyn IForegroundSurface>>>,
    /// Registered resume listeners. Narrower lock than `installed` so
    /// dispatch never serializes behind install/release.
    listeners: Mutex<Vec<ResumedListener>>,
    /// Kept from install so release can unregister.
    events: Mutex<Option<Arc<dyn ILifecycleEvents>>>,
}

impl ActivityTracker {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                installed: Mutex::new(false),
                current: Mutex::new(None),
                listeners: Mutex::new(Vec::new()),
                events: Mutex::new(None),
            }),
        }
    }

    /// The surface currently in the foreground, if it is still alive and
    /// has not paused. Absence is not an error.
    pub fn current_activity(&self) -> Option<Arc<dyn IForegroundSurface>> {
        self.inner
            .current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .and_then(Weak::upgrade)
    }

    /// Register a listener for resume events.
    ///
    /// Deduplicates by listener identity. A listener added while a
    /// dispatch is in flight is only seen by subsequent dispatches: the
    /// dispatching thread iterates a snapshot taken before this call.
    pub fn add_on_resumed_listener(&self, listener: ResumedListener) {
        let mut listeners = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            debug!(target: TARGET, "resume listener already registered, skipping");
            return;
        }
        listeners.push(listener);
    }
}

impl Default for ActivityTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorModule for ActivityTracker {
    fn name(&self) -> &'static str {
        "activity_tracker"
    }

    fn install(&self, host: &Arc<dyn IHostContext>) -> Result<(), ModuleError> {
        {
            let mut installed = self.inner.installed.lock().unwrap_or_else(|e| e.into_inner());
            if *installed {
                warn!(target: TARGET, "activity tracker already installed, skipping");
                return Ok(());
            }
            *installed = true;
        }

        let events = host.lifecycle_events();
        events.register(Arc::clone(&self.inner) as Arc<dyn ILifecycleObserver>);
        *self.inner.events.lock().unwrap_or_else(|e| e.into_inner()) = Some(events);

        debug!(target: TARGET, "activity tracker installed");
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
            let observer = Arc::clone(&self.inner) as Arc<dyn ILifecycleObserver>;
            if !events.unregister(&observer) {
                debug!(target: TARGET, "lifecycle observer already unregistered");
            }
        }

        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        *self.inner.current.lock().unwrap_or_else(|e| e.into_inner()) = None;
        debug!(target: TARGET, "activity tracker released");
    }
}

impl ILifecycleObserver for TrackerInner {
    fn on_surface_resumed(&self, surface: &Arc<dyn IForegroundSurface>) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(Arc::downgrade(surface));

        // Snapshot under lock, dispatch outside it: a listener added during
        // dispatch joins the next event, and no listener runs under our lock.
        let snapshot = self
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| (*listener)(surface))).is_err() {
                error!(
                    target: TARGET,
                    surface = surface.name(),
                    "resume listener panicked; continuing with remaining listeners"
                );
            }
        }
    }

    fn on_surface_paused(&self, surface: &Arc<dyn IForegroundSurface>) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        // Only clear if the pausing surface is still the one we track. A
        // stale pause (raced with a later resume) must not clobber it.
        let is_tracked = current
            .as_ref()
            .is_some_and(|w| w.ptr_eq(&Arc::downgrade(surface)));
        if is_tracked {
            *current = None;
        }
    }
}
