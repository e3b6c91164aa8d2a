//! Crash monitoring - panic capture plus hang detection
//!
//! Installs a process-wide panic hook that records the panic (message,
//! location, thread, and optionally the current foreground surface) through
//! structured logging, then delegates to whatever hook was installed
//! before, so default behavior such as stderr output is preserved. The
//! module also owns starting and stopping the [`HangWatchdog`].
//!
//! The panic hook is global process state. Release restores the previous
//! hook only while this module's hook is still the installed one, tracked
//! through a liveness token the hook closure owns. A hook installed by a
//! third party *after* install (replacing ours) is left in place; our
//! capture logic is disabled either way. A third party that *wraps* our
//! hook instead of replacing it is indistinguishable from our own chain
//! and will be dropped by the restore.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, Weak,
};

use tracing::{debug, error, warn};

use metricflow_core::module::{ModuleError, MonitorModule};
use metricflow_core::ports::IHostContext;

use crate::activity::ActivityTracker;
use crate::watchdog::HangWatchdog;

const TARGET: &str = "metricflow::crash";

/// Captures unhandled panics and supervises the hang watchdog.
pub struct CrashMonitor {
    inner: Arc<CrashInner>,
}

struct CrashInner {
    installed: Mutex<bool>,
    /// Whether panic capture in the hook should do anything. Cleared on
    /// release so a hook we could not unhook degrades to pure delegation.
    hook_active: Arc<AtomicBool>,
    /// Reinstates the pre-install panic behavior. Set by install.
    restore: Mutex<Option<Box<dyn FnOnce() + Send>>>,
    /// Upgradeable only while the hook closure set by install is still the
    /// registered one; `set_hook` drops a replaced closure and its token.
    shim_token: Mutex<Option<Weak<()>>>,
    capture_context: bool,
    watchdog: Arc<HangWatchdog>,
    activity: Arc<ActivityTracker>,
}

impl CrashMonitor {
    /// `capture_context` controls whether the current foreground surface's
    /// name is attached to captured panics.
    pub fn new(
        watchdog: Arc<HangWatchdog>,
        activity: Arc<ActivityTracker>,
        capture_context: bool,
    ) -> Self {
        Self {
            inner: Arc::new(CrashInner {
                installed: Mutex::new(false),
                hook_active: Arc::new(AtomicBool::new(false)),
                restore: Mutex::new(None),
                shim_token: Mutex::new(None),
                capture_context,
                watchdog,
                activity,
            }),
        }
    }
}

impl MonitorModule for CrashMonitor {
    fn name(&self) -> &'static str {
        "crash_monitor"
    }

    fn install(&self, host: &Arc<dyn IHostContext>) -> Result<(), ModuleError> {
        {
            let mut installed = self.inner.installed.lock().unwrap_or_else(|e| e.into_inner());
            if *installed {
                warn!(target: TARGET, "crash monitor already installed, skipping");
                return Ok(());
            }
            *installed = true;
        }

        if let Err(e) = self.inner.watchdog.start(host.main_executor()) {
            *self.inner.installed.lock().unwrap_or_else(|e| e.into_inner()) = false;
            return Err(e);
        }

        self.inner.hook_active.store(true, Ordering::SeqCst);

        // Chain onto the existing hook. The previous hook is shared so the
        // restore closure can reinstate it without tearing down the chain
        // it may itself be part of.
        let prev: Arc<dyn Fn(&std::panic::PanicHookInfo<'_>) + Send + Sync> =
            Arc::from(std::panic::take_hook());
        let prev_for_hook = Arc::clone(&prev);
        let hook_inner = Arc::clone(&self.inner);
        let token = Arc::new(());
        *self.inner.shim_token.lock().unwrap_or_else(|e| e.into_inner()) =
            Some(Arc::downgrade(&token));
        std::panic::set_hook(Box::new(move |panic_info| {
            // The token lives exactly as long as this closure.
            let _ = &token;
            if hook_inner.hook_active.load(Ordering::SeqCst) {
                let message = panic_info
                    .payload()
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic_info.payload().downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic payload".to_string());
                let location = panic_info
                    .location()
                    .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
                    .unwrap_or_default();
                hook_inner.record_panic(&message, &location);
            }
            (*prev_for_hook)(panic_info);
        }));

        *self.inner.restore.lock().unwrap_or_else(|e| e.into_inner()) =
            Some(Box::new(move || {
                std::panic::set_hook(Box::new(move |panic_info| (*prev)(panic_info)));
            }));

        debug!(
            target: TARGET,
            capture_context = self.inner.capture_context,
            "crash monitor installed"
        );
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

        self.inner.hook_active.store(false, Ordering::SeqCst);
        let still_ours = self
            .inner
            .shim_token
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .is_some_and(|token| token.upgrade().is_some());
        let restore = self.inner.restore.lock().unwrap_or_else(|e| e.into_inner()).take();
        if still_ours {
            if let Some(restore) = restore {
                // Drop our chained hook, then put the previous behavior back.
                let _ = std::panic::take_hook();
                restore();
            }
        } else if restore.is_some() {
            warn!(
                target: TARGET,
                "panic hook was replaced after install, leaving the current hook in place"
            );
        }

        self.inner.watchdog.stop();
        debug!(target: TARGET, "crash monitor released");
    }
}

impl CrashInner {
    fn record_panic(&self, message: &str, location: &str) {
        let thread = std::thread::current();
        let surface = self.current_surface_name();
        error!(
            target: TARGET,
            panic_message = message,
            location = location,
            thread = thread.name().unwrap_or("<unnamed>"),
            surface = surface.as_deref().unwrap_or("<none>"),
            "unhandled panic captured"
        );
    }

    /// Foreground surface name at capture time, gated by the context
    /// toggle.
    fn current_surface_name(&self) -> Option<String> {
        if !self.capture_context {
            return None;
        }
        self.activity
            .current_activity()
            .map(|s| s.name().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeHost;
    use crate::watchdog::WatchdogTiming;
    use metricflow_core::ports::IForegroundSurface;
    use serial_test::serial;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn fast_watchdog() -> Arc<HangWatchdog> {
        Arc::new(HangWatchdog::with_timing(WatchdogTiming {
            probe_timeout: Duration::from_millis(50),
            poll_interval: Duration::from_millis(5),
            cooldown: Duration::from_millis(5),
        }))
    }

    fn monitor(capture_context: bool) -> (CrashMonitor, Arc<HangWatchdog>) {
        let watchdog = fast_watchdog();
        let activity = Arc::new(ActivityTracker::new());
        (
            CrashMonitor::new(Arc::clone(&watchdog), activity, capture_context),
            watchdog,
        )
    }

    struct TestSurface;
    impl IForegroundSurface for TestSurface {
        fn name(&self) -> &str {
            "MainScreen"
        }
    }

    #[test]
    #[serial]
    fn install_starts_watchdog_and_release_stops_it() {
        let host = FakeHost::shared();
        let (monitor, watchdog) = monitor(false);

        monitor.install(&host).unwrap();
        assert!(watchdog.is_running());

        monitor.release();
        assert!(!watchdog.is_running());
        let _ = std::panic::take_hook();
    }

    #[test]
    #[serial]
    fn panic_hook_chains_to_previous_and_restores_on_release() {
        let host = FakeHost::shared();
        let prev_hits = Arc::new(AtomicUsize::new(0));

        let hits = Arc::clone(&prev_hits);
        std::panic::set_hook(Box::new(move |_info| {
            hits.fetch_add(1, Ordering::SeqCst);
        }));

        let (monitor, _watchdog) = monitor(false);
        monitor.install(&host).unwrap();

        let _ = std::thread::spawn(|| panic!("boom while installed")).join();
        assert_eq!(
            prev_hits.load(Ordering::SeqCst),
            1,
            "chained hook must delegate to the previous hook"
        );

        monitor.release();

        let _ = std::thread::spawn(|| panic!("boom after release")).join();
        assert_eq!(
            prev_hits.load(Ordering::SeqCst),
            2,
            "previous hook must survive release"
        );
        let _ = std::panic::take_hook();
    }

    #[test]
    #[serial]
    fn release_leaves_replacement_hook_installed() {
        let host = FakeHost::shared();
        let prev_hits = Arc::new(AtomicUsize::new(0));

        let hits = Arc::clone(&prev_hits);
        std::panic::set_hook(Box::new(move |_info| {
            hits.fetch_add(1, Ordering::SeqCst);
        }));

        let (monitor, _watchdog) = monitor(false);
        monitor.install(&host).unwrap();

        // A third party replaces the whole hook after our install.
        let replacement_hits = Arc::new(AtomicUsize::new(0));
        let hits = Arc::clone(&replacement_hits);
        std::panic::set_hook(Box::new(move |_info| {
            hits.fetch_add(1, Ordering::SeqCst);
        }));

        monitor.release();

        let _ = std::thread::spawn(|| panic!("after release")).join();
        assert_eq!(
            replacement_hits.load(Ordering::SeqCst),
            1,
            "replacement hook must survive release"
        );
        assert_eq!(
            prev_hits.load(Ordering::SeqCst),
            0,
            "pre-install hook must not be reinstated over the replacement"
        );
        let _ = std::panic::take_hook();
    }

    #[test]
    #[serial]
    fn double_install_is_idempotent() {
        let host = FakeHost::shared();
        let prev_hits = Arc::new(AtomicUsize::new(0));

        let hits = Arc::clone(&prev_hits);
        std::panic::set_hook(Box::new(move |_info| {
            hits.fetch_add(1, Ordering::SeqCst);
        }));

        let (monitor, watchdog) = monitor(false);
        monitor.install(&host).unwrap();
        monitor.install(&host).unwrap();
        assert!(watchdog.is_running());

        // A double-wrapped hook would reach the previous hook once but run
        // our capture twice; a doubled chain would also survive a single
        // release. One release must fully unhook.
        monitor.release();
        assert!(!watchdog.is_running());

        let _ = std::thread::spawn(|| panic!("after single release")).join();
        assert_eq!(prev_hits.load(Ordering::SeqCst), 1);
        let _ = std::panic::take_hook();
    }

    #[test]
    #[serial]
    fn release_before_install_is_noop() {
        let (monitor, watchdog) = monitor(false);
        monitor.release();
        assert!(!watchdog.is_running());
    }

    #[test]
    fn surface_capture_respects_toggle() {
        let surface: Arc<dyn IForegroundSurface> = Arc::new(TestSurface);

        let watchdog = fast_watchdog();
        let activity = Arc::new(ActivityTracker::new());
        let host = FakeHost::shared();
        activity.install(&host).unwrap();
        host.push_resumed(&surface);

        let enabled = CrashMonitor::new(
            Arc::clone(&watchdog),
            Arc::clone(&activity),
            true,
        );
        assert_eq!(
            enabled.inner.current_surface_name().as_deref(),
            Some("MainScreen")
        );

        let disabled = CrashMonitor::new(watchdog, Arc::clone(&activity), false);
        assert_eq!(disabled.inner.current_surface_name(), None);
        activity.release();
    }
}
