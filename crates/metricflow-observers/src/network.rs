//! Network request timing
//!
//! The SDK does no network I/O of its own. The host's HTTP stack calls
//! [`NetworkObserver::timer`] around each request from its own middleware
//! or interceptor layer; the returned [`RequestTimer`] logs method, URL,
//! outcome, and wall-clock duration when finished. `NetworkClientKind`
//! names the stack so the log lines attribute timings to the right client.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::{debug, info, warn};

use metricflow_core::module::{ModuleError, MonitorModule};
use metricflow_core::ports::IHostContext;

const TARGET: &str = "metricflow::network";

/// The HTTP client stack the host integrates with.
///
/// Defaults to [`Reqwest`](Self::Reqwest), the most common stack among
/// embedding hosts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NetworkClientKind {
    #[default]
    Reqwest,
    Ureq,
    Hyper,
    Curl,
}

impl std::fmt::Display for NetworkClientKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NetworkClientKind::Reqwest => "reqwest",
            NetworkClientKind::Ureq => "ureq",
            NetworkClientKind::Hyper => "hyper",
            NetworkClientKind::Curl => "curl",
        };
        write!(f, "{}", s)
    }
}

/// Times one request. Obtain from [`NetworkObserver::timer`], then call
/// exactly one of [`finish`](Self::finish) or [`fail`](Self::fail).
pub struct RequestTimer {
    client: NetworkClientKind,
    method: String,
    url: String,
    started: Instant,
}

impl RequestTimer {
    /// Record a completed request with its HTTP status.
    pub fn finish(self, status: u16) {
        info!(
            target: TARGET,
            client = %self.client,
            method = %self.method,
            url = %self.url,
            status = status,
            duration_ms = self.started.elapsed().as_millis() as u64,
            "request completed"
        );
    }

    /// Record a request that failed before producing a status.
    pub fn fail(self, error: &str) {
        warn!(
            target: TARGET,
            client = %self.client,
            method = %self.method,
            url = %self.url,
            error = error,
            duration_ms = self.started.elapsed().as_millis() as u64,
            "request failed"
        );
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

/// Module wrapper around request timing for one client kind.
pub struct NetworkObserver {
    client: NetworkClientKind,
    installed: Mutex<bool>,
}

impl NetworkObserver {
    pub fn new(client: NetworkClientKind) -> Self {
        Self {
            client,
            installed: Mutex::new(false),
        }
    }

    pub fn client_kind(&self) -> NetworkClientKind {
        self.client
    }

    /// Start timing a request.
    pub fn timer(&self, method: &str, url: &str) -> RequestTimer {
        RequestTimer {
            client: self.client,
            method: method.to_string(),
            url: url.to_string(),
            started: Instant::now(),
        }
    }
}

impl MonitorModule for NetworkObserver {
    fn name(&self) -> &'static str {
        "network_observer"
    }

    fn install(&self, _host: &Arc<dyn IHostContext>) -> Result<(), ModuleError> {
        let mut installed = self.installed.lock().unwrap_or_else(|e| e.into_inner());
        if *installed {
            warn!(target: TARGET, "network observer already installed, skipping");
            return Ok(());
        }
        *installed = true;
        debug!(target: TARGET, client = %self.client, "network observer installed");
        Ok(())
    }

    fn release(&self) {
        let mut installed = self.installed.lock().unwrap_or_else(|e| e.into_inner());
        if !*installed {
            return;
        }
        *installed = false;
        debug!(target: TARGET, "network observer released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn timer_measures_elapsed_time() {
        let observer = NetworkObserver::new(NetworkClientKind::Reqwest);
        let timer = observer.timer("GET", "https://example.com/api");
        std::thread::sleep(Duration::from_millis(10));
        assert!(timer.elapsed_ms() >= 10);
        timer.finish(200);
    }

    #[test]
    fn failure_path_consumes_timer() {
        let observer = NetworkObserver::new(NetworkClientKind::Ureq);
        let timer = observer.timer("POST", "https://example.com/upload");
        timer.fail("connection reset");
    }

    #[test]
    fn default_client_kind_is_reqwest() {
        assert_eq!(NetworkClientKind::default(), NetworkClientKind::Reqwest);
    }

    #[test]
    fn client_kind_is_reported() {
        let observer = NetworkObserver::new(NetworkClientKind::Hyper);
        assert_eq!(observer.client_kind(), NetworkClientKind::Hyper);
        assert_eq!(NetworkClientKind::Curl.to_string(), "curl");
    }
}
