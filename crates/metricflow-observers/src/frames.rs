//! Frame timing observer
//!
//! Aggregates per-frame render timings from the host's optional frame feed
//! into per-second throughput reports, and counts frames slow enough to be
//! visible as jank. A host without a render loop gets a warned no-op
//! install.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use metricflow_core::module::{ModuleError, MonitorModule};
use metricflow_core::ports::{IFrameEvents, IFrameObserver, IHostContext};

const TARGET: &str = "metricflow::frames";

/// Frames slower than this count as janky: two 60 Hz vsync periods.
pub const JANK_FRAME_CUTOFF: Duration = Duration::from_millis(32);

/// Aggregated statistics for one closed reporting window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    /// Frames per second over the window.
    pub fps: f64,
    /// Total frames rendered in the window.
    pub frames: u32,
    /// Frames that exceeded [`JANK_FRAME_CUTOFF`].
    pub janky: u32,
}

pub struct FrameObserver {
    inner: Arc<FrameInner>,
}

struct FrameInner {
    installed: Mutex<bool>,
    events: Mutex<Option<Arc<dyn IFrameEvents>>>,
    /// Reporting window length; one second in production.
    window_len: Duration,
    window: Mutex<FrameWindow>,
    last_report: Mutex<Option<FrameReport>>,
}

struct FrameWindow {
    started: Instant,
    frames: u32,
    janky: u32,
}

impl FrameObserver {
    pub fn new() -> Self {
        Self::with_window(Duration::from_secs(1))
    }

    /// Observer with a custom reporting window length.
    pub fn with_window(window_len: Duration) -> Self {
        Self {
            inner: Arc::new(FrameInner {
                installed: Mutex::new(false),
                events: Mutex::new(None),
                window_len,
                window: Mutex::new(FrameWindow {
                    started: Instant::now(),
                    frames: 0,
                    janky: 0,
                }),
                last_report: Mutex::new(None),
            }),
        }
    }

    /// Statistics for the most recently closed window, if any yet.
    pub fn last_report(&self) -> Option<FrameReport> {
        *self
            .inner
            .last_report
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for FrameObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorModule for FrameObserver {
    fn name(&self) -> &'static str {
        "frame_observer"
    }

    fn install(&self, host: &Arc<dyn IHostContext>) -> Result<(), ModuleError> {
        {
            let mut installed = self.inner.installed.lock().unwrap_or_else(|e| e.into_inner());
            if *installed {
                warn!(target: TARGET, "frame observer already installed, skipping");
                return Ok(());
            }
            *installed = true;
        }

        let Some(events) = host.frame_events() else {
            warn!(target: TARGET, "host has no frame feed, frame observer idle");
            return Ok(());
        };

        events.register(Arc::clone(&self.inner) as Arc<dyn IFrameObserver>);
        *self.inner.events.lock().unwrap_or_else(|e| e.into_inner()) = Some(events);
        debug!(target: TARGET, "frame observer installed");
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
            let observer = Arc::clone(&self.inner) as Arc<dyn IFrameObserver>;
            if !events.unregister(&observer) {
                debug!(target: TARGET, "frame observer already unregistered");
            }
        }
        debug!(target: TARGET, "frame observer released");
    }
}

impl IFrameObserver for FrameInner {
    fn on_frame_rendered(&self, duration: Duration) {
        let mut window = self.window.lock().unwrap_or_else(|e| e.into_inner());

        // The window clock starts at the first frame, not at install, so an
        // idle host does not dilute its first report.
        if window.frames == 0 {
            window.started = Instant::now();
        }
        window.frames += 1;
        if duration > JANK_FRAME_CUTOFF {
            window.janky += 1;
            debug!(
                target: TARGET,
                duration_ms = duration.as_millis() as u64,
                "janky frame"
            );
        }

        let elapsed = window.started.elapsed();
        if elapsed >= self.window_len {
            let report = FrameReport {
                fps: f64::from(window.frames) / elapsed.as_secs_f64(),
                frames: window.frames,
                janky: window.janky,
            };
            info!(
                target: TARGET,
                fps = report.fps,
                frames = report.frames,
                janky = report.janky,
                "frame window closed"
            );
            *self.last_report.lock().unwrap_or_else(|e| e.into_inner()) = Some(report);
            window.frames = 0;
            window.janky = 0;
            window.started = Instant::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metricflow_core::ports::{
        ILifecycleEvents, IMainExecutor, IMemoryPressureEvents, IMemoryProbe,
    };
    use std::path::PathBuf;

    struct RecordingFrameEvents {
        observers: Mutex<Vec<Arc<dyn IFrameObserver>>>,
    }

    impl RecordingFrameEvents {
        fn shared() -> Arc<Self> {
            Arc::new(Self {
                observers: Mutex::new(Vec::new()),
            })
        }

        fn push_frame(&self, duration: Duration) {
            let observers = self.observers.lock().unwrap().clone();
            for observer in observers {
                observer.on_frame_rendered(duration);
            }
        }
    }

    impl IFrameEvents for RecordingFrameEvents {
        fn register(&self, observer: Arc<dyn IFrameObserver>) {
            self.observers.lock().unwrap().push(observer);
        }

        fn unregister(&self, observer: &Arc<dyn IFrameObserver>) -> bool {
            let mut observers = self.observers.lock().unwrap();
            let before = observers.len();
            observers.retain(|o| !Arc::ptr_eq(o, observer));
            observers.len() < before
        }
    }

    struct HostWithFrames {
        frames: Arc<RecordingFrameEvents>,
    }

    struct HostWithoutFrames;

    macro_rules! unsupported_host_surface {
        () => {
            fn cache_dir(&self) -> PathBuf {
                std::env::temp_dir()
            }
            fn main_executor(&self) -> Arc<dyn IMainExecutor> {
                unimplemented!("not used by frame tests")
            }
            fn lifecycle_events(&self) -> Arc<dyn ILifecycleEvents> {
                unimplemented!("not used by frame tests")
            }
            fn memory_pressure_events(&self) -> Arc<dyn IMemoryPressureEvents> {
                unimplemented!("not used by frame tests")
            }
            fn memory_probe(&self) -> Arc<dyn IMemoryProbe> {
                unimplemented!("not used by frame tests")
            }
        };
    }

    impl IHostContext for HostWithFrames {
        unsupported_host_surface!();

        fn frame_events(&self) -> Option<Arc<dyn IFrameEvents>> {
            Some(Arc::clone(&self.frames) as Arc<dyn IFrameEvents>)
        }
    }

    impl IHostContext for HostWithoutFrames {
        unsupported_host_surface!();
    }

    #[test]
    fn installs_and_registers_when_feed_present() {
        let frames = RecordingFrameEvents::shared();
        let host: Arc<dyn IHostContext> = Arc::new(HostWithFrames {
            frames: Arc::clone(&frames),
        });

        let observer = FrameObserver::new();
        observer.install(&host).unwrap();
        assert_eq!(frames.observers.lock().unwrap().len(), 1);

        observer.release();
        assert!(frames.observers.lock().unwrap().is_empty());
    }

    #[test]
    fn missing_feed_is_a_successful_noop() {
        let host: Arc<dyn IHostContext> = Arc::new(HostWithoutFrames);
        let observer = FrameObserver::new();
        observer.install(&host).unwrap();
        observer.release();
    }

    #[test]
    fn window_reports_fps_and_jank_count() {
        let frames = RecordingFrameEvents::shared();
        let host: Arc<dyn IHostContext> = Arc::new(HostWithFrames {
            frames: Arc::clone(&frames),
        });

        let observer = FrameObserver::with_window(Duration::from_millis(50));
        observer.install(&host).unwrap();

        for _ in 0..3 {
            frames.push_frame(Duration::from_millis(16));
        }
        frames.push_frame(Duration::from_millis(40));
        assert!(observer.last_report().is_none());

        std::thread::sleep(Duration::from_millis(60));
        frames.push_frame(Duration::from_millis(16));

        let report = observer.last_report().expect("window should have closed");
        assert_eq!(report.frames, 5);
        assert_eq!(report.janky, 1);
        assert!(report.fps > 0.0);
    }

    #[test]
    fn frame_at_cutoff_is_not_janky() {
        let frames = RecordingFrameEvents::shared();
        let host: Arc<dyn IHostContext> = Arc::new(HostWithFrames {
            frames: Arc::clone(&frames),
        });

        let observer = FrameObserver::with_window(Duration::from_millis(20));
        observer.install(&host).unwrap();

        frames.push_frame(JANK_FRAME_CUTOFF);
        std::thread::sleep(Duration::from_millis(30));
        frames.push_frame(JANK_FRAME_CUTOFF + Duration::from_millis(1));

        let report = observer.last_report().expect("window should have closed");
        assert_eq!(report.frames, 2);
        assert_eq!(report.janky, 1);
    }
}
