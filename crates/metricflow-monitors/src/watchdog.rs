//! Hang watchdog - detects an unresponsive primary execution context
//!
//! A dedicated, named background thread repeatedly posts a no-op
//! acknowledgment job onto the host's primary execution context and waits
//! for it to run. A healthy primary context runs the job within
//! milliseconds; if the acknowledgment has not arrived after the probe
//! timeout, the thread emits a hang-detected event and keeps probing.
//!
//! ## Flow
//!
//! ```text
//! watchdog thread ──post ack──→ IMainExecutor ──runs──→ acked flag
//!       │                                                   │
//!       └── poll every 100 ms, up to 5 s ───────────────────┘
//! ```
//!
//! Detection is best-effort and logged-only: a hang does not stop the
//! loop, and recovery needs no special handling because the next probe
//! cycle starts from a fresh flag.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use metricflow_core::module::ModuleError;
use metricflow_core::ports::IMainExecutor;

const TARGET: &str = "metricflow::watchdog";

/// Probe cadence knobs, injectable so tests do not wait seconds.
#[derive(Debug, Clone, Copy)]
pub struct WatchdogTiming {
    /// How long an acknowledgment may take before a hang is declared.
    pub probe_timeout: Duration,
    /// Granularity of the acknowledgment poll.
    pub poll_interval: Duration,
    /// Pause between probe cycles, bounding CPU and queue pressure.
    pub cooldown: Duration,
}

impl Default for WatchdogTiming {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_millis(5_000),
            poll_interval: Duration::from_millis(100),
            cooldown: Duration::from_millis(500),
        }
    }
}

/// Watchdog over the host's primary execution context.
///
/// `start`/`stop` are idempotent and callable from any thread; the pair
/// may be cycled repeatedly (stop fully reclaims the thread, a later start
/// spawns a fresh one).
pub struct HangWatchdog {
    /// Set while the probe loop should keep going; cleared by `stop`.
    running: Arc<AtomicBool>,
    /// Set between a successful `start` and the matching `stop`.
    started: AtomicBool,
    /// Serializes start/stop transitions and owns the thread handle.
    handle: Mutex<Option<JoinHandle<()>>>,
    timing: WatchdogTiming,
}

impl HangWatchdog {
    pub fn new() -> Self {
        Self::with_timing(WatchdogTiming::default())
    }

    pub fn with_timing(timing: WatchdogTiming) -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            started: AtomicBool::new(false),
            handle: Mutex::new(None),
            timing,
        }
    }

    /// Spawn the watchdog thread probing `executor`.
    ///
    /// A second `start` while already running is a warned no-op. A spawn
    /// failure leaves the watchdog stopped and is reported to the caller.
    pub fn start(&self, executor: Arc<dyn IMainExecutor>) -> Result<(), ModuleError> {
        let mut handle = self.handle.lock().unwrap_or_else(|e| e.into_inner());

        if self.started.load(Ordering::Acquire) {
            warn!(target: TARGET, "watchdog already started, skipping");
            return Ok(());
        }

        self.running.store(true, Ordering::Release);
        let running = Arc::clone(&self.running);
        let timing = self.timing;

        let spawned = thread::Builder::new()
            .name("metricflow-watchdog".into())
            .spawn(move || probe_loop(executor, running, timing));

        match spawned {
            Ok(h) => {
                *handle = Some(h);
                self.started.store(true, Ordering::Release);
                debug!(target: TARGET, "watchdog started");
                Ok(())
            }
            Err(source) => {
                self.running.store(false, Ordering::Release);
                Err(ModuleError::Spawn {
                    thread: "metricflow-watchdog",
                    source,
                })
            }
        }
    }

    /// Stop the probe loop and reclaim the thread.
    ///
    /// Blocks briefly (bounded by one poll increment plus the cooldown)
    /// while the thread observes the cleared flag. Stopping a watchdog
    /// that is not running is a no-op.
    pub fn stop(&self) {
        let mut handle = self.handle.lock().unwrap_or_else(|e| e.into_inner());

        if !self.started.swap(false, Ordering::AcqRel) {
            return;
        }
        self.running.store(false, Ordering::Release);

        if let Some(h) = handle.take() {
            // Wake the thread out of any park so it re-checks the flag now.
            h.thread().unpark();
            if h.join().is_err() {
                error!(target: TARGET, "watchdog thread panicked during shutdown");
            }
        }
        debug!(target: TARGET, "watchdog stopped");
    }

    /// Whether the probe loop is currently active.
    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }
}

impl Default for HangWatchdog {
    fn default() -> Self {
        Self::new()
    }
}

/// The probe loop body, run on the dedicated watchdog thread.
fn probe_loop(executor: Arc<dyn IMainExecutor>, running: Arc<AtomicBool>, timing: WatchdogTiming) {
    info!(target: TARGET, "watchdog probe loop starting");

    while running.load(Ordering::Acquire) {
        let acked = Arc::new(AtomicBool::new(false));
        let ack = Arc::clone(&acked);
        executor.post(Box::new(move || ack.store(true, Ordering::Release)));

        let got_ack = await_ack(&acked, &running, timing);

        if running.load(Ordering::Acquire) && !got_ack {
            error!(
                target: TARGET,
                timeout_ms = timing.probe_timeout.as_millis() as u64,
                "hang detected: primary execution context unresponsive"
            );
        }

        if running.load(Ordering::Acquire) {
            thread::park_timeout(timing.cooldown);
        }
    }

    info!(target: TARGET, "watchdog probe loop stopped");
}

/// Wait for the acknowledgment flag, up to the probe timeout.
///
/// `park_timeout` may return early (stray unpark, spurious wakeup), so the
/// deadline is measured against a wall clock rather than by summing nominal
/// poll intervals; early wakeups must not shorten the detection window.
fn await_ack(acked: &AtomicBool, running: &AtomicBool, timing: WatchdogTiming) -> bool {
    let started = Instant::now();
    while !acked.load(Ordering::Acquire)
        && running.load(Ordering::Acquire)
        && started.elapsed() < timing.probe_timeout
    {
        thread::park_timeout(timing.poll_interval);
    }
    acked.load(Ordering::Acquire)
}
