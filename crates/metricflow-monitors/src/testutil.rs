//! Shared in-memory host fakes for the monitor module tests.

use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    Arc, Mutex,
};

use metricflow_core::ports::{
    HeapUsage, IForegroundSurface, IHostContext, ILifecycleEvents, ILifecycleObserver,
    IMainExecutor, IMemoryPressureEvents, IMemoryPressureObserver, IMemoryProbe, ProbeError,
    ProcessPss, SystemMemory,
};
use metricflow_core::snapshot::{MemorySnapshot, TrimLevel};

use crate::sampler::SamplerListener;

/// Runs posted jobs immediately on the calling thread.
pub(crate) struct InlineMainExecutor {
    #[allow(dead_code)]
    pub(crate) posted: AtomicUsize,
}

impl IMainExecutor for InlineMainExecutor {
    fn post(&self, job: Box<dyn FnOnce() + Send + 'static>) {
        self.posted.fetch_add(1, Ordering::SeqCst);
        job();
    }
}

/// Configurable probe whose readings the test controls.
pub(crate) struct MockProbe {
    total_pss_kb: AtomicU64,
    system_low: AtomicBool,
    failing: AtomicBool,
    dump_count: AtomicUsize,
}

impl MockProbe {
    fn new() -> Self {
        Self {
            total_pss_kb: AtomicU64::new(1_024),
            system_low: AtomicBool::new(false),
            failing: AtomicBool::new(false),
            dump_count: AtomicUsize::new(0),
        }
    }

    pub(crate) fn set_total_pss_kb(&self, kb: u64) {
        self.total_pss_kb.store(kb, Ordering::SeqCst);
    }

    pub(crate) fn set_system_low_memory(&self, low: bool) {
        self.system_low.store(low, Ordering::SeqCst);
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    #[allow(dead_code)]
    pub(crate) fn dump_count(&self) -> usize {
        self.dump_count.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), ProbeError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(ProbeError::Parse {
                source_name: "mock",
                detail: "forced failure".into(),
            })
        } else {
            Ok(())
        }
    }
}

impl IMemoryProbe for MockProbe {
    fn process_pss(&self) -> Result<ProcessPss, ProbeError> {
        self.check()?;
        let total_kb = self.total_pss_kb.load(Ordering::SeqCst);
        Ok(ProcessPss {
            total_kb,
            anon_kb: total_kb / 2,
            file_kb: total_kb / 4,
            shmem_kb: total_kb / 4,
        })
    }

    fn heap_usage(&self) -> Result<HeapUsage, ProbeError> {
        self.check()?;
        Ok(HeapUsage {
            used_bytes: 8 << 20,
            free_bytes: 8 << 20,
            total_bytes: 16 << 20,
        })
    }

    fn system_memory(&self) -> Result<SystemMemory, ProbeError> {
        self.check()?;
        Ok(SystemMemory {
            avail_bytes: 4 << 30,
            total_bytes: 8 << 30,
            low_memory: self.system_low.load(Ordering::SeqCst),
        })
    }

    fn dump_heap(&self, path: &Path) -> Result<(), ProbeError> {
        self.check()?;
        std::fs::write(path, b"mock heap dump")?;
        self.dump_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FakeLifecycleEvents {
    observers: Mutex<Vec<Arc<dyn ILifecycleObserver>>>,
}

impl ILifecycleEvents for FakeLifecycleEvents {
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

struct FakePressureEvents {
    observers: Mutex<Vec<Arc<dyn IMemoryPressureObserver>>>,
}

impl IMemoryPressureEvents for FakePressureEvents {
    fn register(&self, observer: Arc<dyn IMemoryPressureObserver>) {
        self.observers.lock().unwrap().push(observer);
    }

    fn unregister(&self, observer: &Arc<dyn IMemoryPressureObserver>) -> bool {
        let mut observers = self.observers.lock().unwrap();
        let before = observers.len();
        observers.retain(|o| !Arc::ptr_eq(o, observer));
        observers.len() < before
    }
}

struct FakeHostInner {
    cache_dir: PathBuf,
    executor: Arc<InlineMainExecutor>,
    lifecycle: Arc<FakeLifecycleEvents>,
    pressure: Arc<FakePressureEvents>,
    probe: Arc<MockProbe>,
}

impl IHostContext for FakeHostInner {
    fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone()
    }

    fn main_executor(&self) -> Arc<dyn IMainExecutor> {
        Arc::clone(&self.executor) as Arc<dyn IMainExecutor>
    }

    fn lifecycle_events(&self) -> Arc<dyn ILifecycleEvents> {
        Arc::clone(&self.lifecycle) as Arc<dyn ILifecycleEvents>
    }

    fn memory_pressure_events(&self) -> Arc<dyn IMemoryPressureEvents> {
        Arc::clone(&self.pressure) as Arc<dyn IMemoryPressureEvents>
    }

    fn memory_probe(&self) -> Arc<dyn IMemoryProbe> {
        Arc::clone(&self.probe) as Arc<dyn IMemoryProbe>
    }
}

/// Test host handle. Derefs to the `Arc<dyn IHostContext>` that modules
/// take, while exposing the fakes' control knobs to the test.
pub(crate) struct FakeHost {
    inner: Arc<FakeHostInner>,
    ctx: Arc<dyn IHostContext>,
}

impl FakeHost {
    pub(crate) fn shared() -> Self {
        let inner = Arc::new(FakeHostInner {
            cache_dir: std::env::temp_dir().join("metricflow-tests"),
            executor: Arc::new(InlineMainExecutor {
                posted: AtomicUsize::new(0),
            }),
            lifecycle: Arc::new(FakeLifecycleEvents {
                observers: Mutex::new(Vec::new()),
            }),
            pressure: Arc::new(FakePressureEvents {
                observers: Mutex::new(Vec::new()),
            }),
            probe: Arc::new(MockProbe::new()),
        });
        let ctx = Arc::clone(&inner) as Arc<dyn IHostContext>;
        Self { inner, ctx }
    }

    pub(crate) fn probe(&self) -> &MockProbe {
        &self.inner.probe
    }

    pub(crate) fn pressure_registration_count(&self) -> usize {
        self.inner.pressure.observers.lock().unwrap().len()
    }

    #[allow(dead_code)]
    pub(crate) fn lifecycle_registration_count(&self) -> usize {
        self.inner.lifecycle.observers.lock().unwrap().len()
    }

    /// Deliver a trim notification to every registered pressure observer.
    pub(crate) fn push_trim(&self, level: TrimLevel) {
        let observers = self.inner.pressure.observers.lock().unwrap().clone();
        for observer in observers {
            observer.on_trim(level);
        }
    }

    /// Deliver the legacy low-memory signal.
    pub(crate) fn push_low_memory(&self) {
        let observers = self.inner.pressure.observers.lock().unwrap().clone();
        for observer in observers {
            observer.on_low_memory();
        }
    }

    /// Deliver a surface-resumed lifecycle event.
    #[allow(dead_code)]
    pub(crate) fn push_resumed(&self, surface: &Arc<dyn IForegroundSurface>) {
        let observers = self.inner.lifecycle.observers.lock().unwrap().clone();
        for observer in observers {
            observer.on_surface_resumed(surface);
        }
    }
}

impl Deref for FakeHost {
    type Target = Arc<dyn IHostContext>;

    fn deref(&self) -> &Self::Target {
        &self.ctx
    }
}

/// Recording sampler listener.
pub(crate) struct TestListener {
    samples: AtomicUsize,
    low_memory: Mutex<Vec<TrimLevel>>,
    dumps: Mutex<Vec<PathBuf>>,
}

impl TestListener {
    pub(crate) fn shared() -> Arc<Self> {
        Arc::new(Self {
            samples: AtomicUsize::new(0),
            low_memory: Mutex::new(Vec::new()),
            dumps: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn samples(&self) -> usize {
        self.samples.load(Ordering::SeqCst)
    }

    pub(crate) fn low_memory_events(&self) -> Vec<TrimLevel> {
        self.low_memory.lock().unwrap().clone()
    }

    pub(crate) fn dumps(&self) -> Vec<PathBuf> {
        self.dumps.lock().unwrap().clone()
    }
}

impl SamplerListener for TestListener {
    fn on_sample(&self, _snapshot: &MemorySnapshot) {
        self.samples.fetch_add(1, Ordering::SeqCst);
    }

    fn on_low_memory(&self, level: TrimLevel, _snapshot: &MemorySnapshot) {
        self.low_memory.lock().unwrap().push(level);
    }

    fn on_heap_dump_saved(&self, path: &Path) {
        self.dumps.lock().unwrap().push(path.to_path_buf());
    }
}
