//! Periodic memory sampler with heap-dump offloading
//!
//! Produces a [`MemorySnapshot`] at a fixed cadence on its own sampling
//! thread, classifies memory pressure, and fans the snapshot out to
//! registered listeners. Host-pushed trim and low-memory notifications go
//! through the same classify-and-fan-out path.
//!
//! ## Flow
//!
//! ```text
//! sampling thread ──tick──→ IMemoryProbe ──→ MemorySnapshot ──→ listeners
//!                                                 │
//!                             low memory? ──→ mpsc ──→ heap-dump worker
//! ```
//!
//! Heap dumps are expensive, so they are never written on the sampling
//! thread: a worker thread is created lazily on the first dump request and
//! discarded at uninstall. A dump that is slow or fails can therefore
//! never delay the next sample.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc, Arc, Mutex,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use metricflow_core::config::{SamplerConfig, MAX_SAMPLE_INTERVAL_MS};
use metricflow_core::module::{ModuleError, MonitorModule};
use metricflow_core::ports::{
    IHostContext, IMemoryPressureEvents, IMemoryPressureObserver, IMemoryProbe, ProbeError,
};
use metricflow_core::snapshot::{MemorySnapshot, TrimLevel};

const TARGET: &str = "metricflow::sampler";

/// Receives sampler events. All methods are invoked with the listener
/// list's lock released and are individually isolated: a panic in one
/// listener is logged and does not reach the others.
pub trait SamplerListener: Send + Sync {
    /// A periodic or on-demand snapshot.
    fn on_sample(&self, snapshot: &MemorySnapshot);

    /// A host-pushed pressure notification, with the trim severity and a
    /// snapshot taken at notification time.
    fn on_low_memory(&self, level: TrimLevel, snapshot: &MemorySnapshot) {
        let _ = (level, snapshot);
    }

    /// A heap dump finished writing successfully.
    fn on_heap_dump_saved(&self, path: &Path) {
        let _ = path;
    }
}

/// The periodic memory sampler module.
pub struct MemorySampler {
    inner: Arc<SamplerInner>,
}

/// Host handles captured at install time.
#[derive(Clone)]
struct ActiveHost {
    probe: Arc<dyn IMemoryProbe>,
    cache_dir: PathBuf,
    events: Arc<dyn IMemoryPressureEvents>,
}

struct SamplerInner {
    tuning: SamplerConfig,
    installed: Mutex<bool>,
    running: Arc<AtomicBool>,
    active: Mutex<Option<ActiveHost>>,
    /// Separate, narrower lock than `installed` so listener dispatch never
    /// serializes behind install/release.
    listeners: Mutex<Vec<Arc<dyn SamplerListener>>>,
    sampler_thread: Mutex<Option<JoinHandle<()>>>,
    dump_worker: Mutex<Option<DumpWorker>>,
}

/// Sender half of the dump worker's queue. Dropping it ends the worker.
struct DumpWorker {
    tx: mpsc::Sender<DumpRequest>,
}

struct DumpRequest {
    dir: PathBuf,
    probe: Arc<dyn IMemoryProbe>,
    /// Listener snapshot taken when the dump was requested.
    listeners: Vec<Arc<dyn SamplerListener>>,
}

impl MemorySampler {
    pub fn new(tuning: SamplerConfig) -> Self {
        Self {
            inner: Arc::new(SamplerInner {
                tuning,
                installed: Mutex::new(false),
                running: Arc::new(AtomicBool::new(false)),
                active: Mutex::new(None),
                listeners: Mutex::new(Vec::new()),
                sampler_thread: Mutex::new(None),
                dump_worker: Mutex::new(None),
            }),
        }
    }

    /// Register a listener. Deduplicates by identity; safe to call while
    /// a dispatch is in flight (the dispatcher iterates a snapshot).
    pub fn add_listener(&self, listener: Arc<dyn SamplerListener>) {
        let mut listeners = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            debug!(target: TARGET, "sampler listener already registered, skipping");
            return;
        }
        listeners.push(listener);
    }

    /// Synchronous on-demand probe. Returns `None` when the sampler is not
    /// installed or the probe failed (both logged, neither fatal).
    pub fn sample_now(&self) -> Option<MemorySnapshot> {
        let active = self
            .inner
            .active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()?;
        match self.inner.sample_with(&active.probe) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(target: TARGET, error = %e, "on-demand sample failed");
                None
            }
        }
    }
}

impl MonitorModule for MemorySampler {
    fn name(&self) -> &'static str {
        "memory_sampler"
    }

    fn install(&self, host: &Arc<dyn IHostContext>) -> Result<(), ModuleError> {
        let tuning = &self.inner.tuning;
        if tuning.sample_interval_ms == 0 {
            return Err(ModuleError::InvalidConfiguration(
                "sample_interval_ms must be greater than 0".into(),
            ));
        }
        if tuning.sample_interval_ms > MAX_SAMPLE_INTERVAL_MS {
            return Err(ModuleError::InvalidConfiguration(format!(
                "sample_interval_ms must not exceed {MAX_SAMPLE_INTERVAL_MS}"
            )));
        }

        {
            let mut installed = self.inner.installed.lock().unwrap_or_else(|e| e.into_inner());
            if *installed {
                warn!(target: TARGET, "memory sampler already installed, skipping");
                return Ok(());
            }
            *installed = true;
        }

        let active = ActiveHost {
            probe: host.memory_probe(),
            cache_dir: host.cache_dir(),
            events: host.memory_pressure_events(),
        };
        *self.inner.active.lock().unwrap_or_else(|e| e.into_inner()) = Some(active.clone());
        active
            .events
            .register(Arc::clone(&self.inner) as Arc<dyn IMemoryPressureObserver>);

        self.inner.running.store(true, Ordering::Release);
        let loop_inner = Arc::clone(&self.inner);
        let interval = Duration::from_millis(tuning.sample_interval_ms);

        let spawned = thread::Builder::new()
            .name("metricflow-sampler".into())
            .spawn(move || sample_loop(loop_inner, interval));

        match spawned {
            Ok(handle) => {
                *self
                    .inner
                    .sampler_thread
                    .lock()
                    .unwrap_or_else(|e| e.into_inner()) = Some(handle);
                debug!(
                    target: TARGET,
                    interval_ms = tuning.sample_interval_ms,
                    threshold_kb = tuning.low_memory_threshold_kb,
                    "memory sampler installed"
                );
                Ok(())
            }
            Err(source) => {
                // Scheduling failure is fatal to this install: undo every
                // side effect so a retry starts clean.
                self.inner.running.store(false, Ordering::Release);
                let observer = Arc::clone(&self.inner) as Arc<dyn IMemoryPressureObserver>;
                active.events.unregister(&observer);
                *self.inner.active.lock().unwrap_or_else(|e| e.into_inner()) = None;
                *self.inner.installed.lock().unwrap_or_else(|e| e.into_inner()) = false;
                Err(ModuleError::Spawn {
                    thread: "metricflow-sampler",
                    source,
                })
            }
        }
    }

    fn release(&self) {
        {
            let mut installed = self.inner.installed.lock().unwrap_or_else(|e| e.into_inner());
            if !*installed {
                return;
            }
            *installed = false;
        }

        self.inner.running.store(false, Ordering::Release);
        if let Some(handle) = self
            .inner
            .sampler_thread
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            handle.thread().unpark();
            if handle.join().is_err() {
                error!(target: TARGET, "sampling thread panicked during shutdown");
            }
        }

        if let Some(active) = self.inner.active.lock().unwrap_or_else(|e| e.into_inner()).take() {
            let observer = Arc::clone(&self.inner) as Arc<dyn IMemoryPressureObserver>;
            if !active.events.unregister(&observer) {
                debug!(target: TARGET, "pressure observer already unregistered");
            }
        }

        // Dropping the sender ends the worker's queue; the worker finishes
        // any in-flight dump on its own and exits. It is not awaited.
        *self.inner.dump_worker.lock().unwrap_or_else(|e| e.into_inner()) = None;

        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        debug!(target: TARGET, "memory sampler uninstalled");
    }
}

/// The periodic loop body, run on the dedicated sampling thread. The first
/// tick fires immediately (zero initial delay).
fn sample_loop(inner: Arc<SamplerInner>, interval: Duration) {
    info!(target: TARGET, "sampling loop starting");
    while inner.running.load(Ordering::Acquire) {
        inner.tick();
        if inner.running.load(Ordering::Acquire) {
            thread::park_timeout(interval);
        }
    }
    info!(target: TARGET, "sampling loop stopped");
}

impl SamplerInner {
    /// One sampling cycle. Failures are logged and skip the tick; the
    /// cadence itself is never canceled by a bad tick.
    fn tick(&self) {
        let Some(active) = self.active.lock().unwrap_or_else(|e| e.into_inner()).clone() else {
            return;
        };

        let snapshot = match self.sample_with(&active.probe) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(target: TARGET, error = %e, "periodic sample failed, skipping tick");
                return;
            }
        };

        if self.tuning.log_samples {
            debug!(
                target: TARGET,
                total_pss_kb = snapshot.total_pss_kb,
                heap_used_bytes = snapshot.heap_used_bytes,
                avail_mem_bytes = snapshot.avail_mem_bytes,
                low_memory = snapshot.low_memory,
                "memory sample"
            );
        }

        self.fan_out(|l| l.on_sample(&snapshot));

        if snapshot.low_memory && self.tuning.heap_dump_on_low_memory {
            self.request_heap_dump(&active);
        }
    }

    /// Probe and classify. `low_memory` is the host's own signal OR the
    /// configured PSS threshold being reached.
    fn sample_with(&self, probe: &Arc<dyn IMemoryProbe>) -> Result<MemorySnapshot, ProbeError> {
        let pss = probe.process_pss()?;
        let heap = probe.heap_usage()?;
        let system = probe.system_memory()?;

        let threshold_kb = self.tuning.low_memory_threshold_kb;
        let low_memory = system.low_memory || pss.total_kb >= threshold_kb;

        Ok(MemorySnapshot {
            timestamp: Utc::now(),
            total_pss_kb: pss.total_kb,
            anon_pss_kb: pss.anon_kb,
            file_pss_kb: pss.file_kb,
            shmem_pss_kb: pss.shmem_kb,
            heap_used_bytes: heap.used_bytes,
            heap_free_bytes: heap.free_bytes,
            heap_total_bytes: heap.total_bytes,
            avail_mem_bytes: system.avail_bytes,
            total_mem_bytes: system.total_bytes,
            low_memory,
            threshold_kb,
        })
    }

    /// Dispatch over a snapshot of the listener list, isolating panics.
    fn fan_out(&self, invoke: impl Fn(&Arc<dyn SamplerListener>)) {
        let snapshot = self
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for listener in &snapshot {
            if catch_unwind(AssertUnwindSafe(|| invoke(listener))).is_err() {
                error!(
                    target: TARGET,
                    "sampler listener panicked; continuing with remaining listeners"
                );
            }
        }
    }

    /// Queue a heap dump on the worker thread, starting it on first use.
    fn request_heap_dump(&self, active: &ActiveHost) {
        let dir = self
            .tuning
            .heap_dump_dir
            .clone()
            .unwrap_or_else(|| active.cache_dir.clone());

        let mut worker = self.dump_worker.lock().unwrap_or_else(|e| e.into_inner());
        if worker.is_none() {
            *worker = start_dump_worker();
        }
        let Some(worker) = worker.as_ref() else {
            return;
        };

        let request = DumpRequest {
            dir,
            probe: Arc::clone(&active.probe),
            listeners: self
                .listeners
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone(),
        };
        if worker.tx.send(request).is_err() {
            warn!(target: TARGET, "heap dump worker gone, dropping dump request");
        }
    }
}

impl IMemoryPressureObserver for SamplerInner {
    fn on_trim(&self, level: TrimLevel) {
        let Some(active) = self.active.lock().unwrap_or_else(|e| e.into_inner()).clone() else {
            return;
        };
        let snapshot = match self.sample_with(&active.probe) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(target: TARGET, error = %e, level = %level, "sample on trim failed");
                return;
            }
        };

        debug!(
            target: TARGET,
            level = %level,
            low_memory = snapshot.low_memory,
            "trim notification"
        );
        self.fan_out(|l| l.on_low_memory(level, &snapshot));

        if self.tuning.heap_dump_on_low_memory && level.is_severe() {
            self.request_heap_dump(&active);
        }
    }

    fn on_low_memory(&self) {
        let Some(active) = self.active.lock().unwrap_or_else(|e| e.into_inner()).clone() else {
            return;
        };
        let snapshot = match self.sample_with(&active.probe) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(target: TARGET, error = %e, "sample on low-memory signal failed");
                return;
            }
        };

        warn!(target: TARGET, "host low-memory signal");
        self.fan_out(|l| l.on_low_memory(TrimLevel::RunningLow, &snapshot));

        if self.tuning.heap_dump_on_low_memory {
            self.request_heap_dump(&active);
        }
    }
}

/// Spawn the lazily-created dump worker. Returns `None` when the thread
/// cannot be spawned; the failure is logged and the dump request dropped.
fn start_dump_worker() -> Option<DumpWorker> {
    let (tx, rx) = mpsc::channel::<DumpRequest>();
    let spawned = thread::Builder::new()
        .name("metricflow-heapdump".into())
        .spawn(move || dump_loop(rx));

    match spawned {
        Ok(_detached) => Some(DumpWorker { tx }),
        Err(e) => {
            error!(target: TARGET, error = %e, "failed to start heap dump worker");
            None
        }
    }
}

fn dump_loop(rx: mpsc::Receiver<DumpRequest>) {
    debug!(target: TARGET, "heap dump worker starting");
    while let Ok(request) = rx.recv() {
        let path = match create_dump_path(&request.dir) {
            Ok(path) => path,
            Err(e) => {
                error!(
                    target: TARGET,
                    error = %e,
                    dir = %request.dir.display(),
                    "cannot create heap dump directory"
                );
                continue;
            }
        };

        match request.probe.dump_heap(&path) {
            Ok(()) => {
                info!(target: TARGET, path = %path.display(), "heap dump saved");
                for listener in &request.listeners {
                    if catch_unwind(AssertUnwindSafe(|| listener.on_heap_dump_saved(&path)))
                        .is_err()
                    {
                        error!(target: TARGET, "heap dump listener panicked");
                    }
                }
            }
            Err(e) => {
                error!(
                    target: TARGET,
                    error = %e,
                    path = %path.display(),
                    "heap dump failed"
                );
            }
        }
    }
    debug!(target: TARGET, "heap dump worker exiting");
}

/// `<prefix>_<yyyyMMdd_HHmmss>.<ext>` inside `dir`, creating `dir` first.
fn create_dump_path(dir: &Path) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let ts = Utc::now().format("%Y%m%d_%H%M%S");
    Ok(dir.join(format!("metricflow_heap_{ts}.heap")))
}
