//! Connectivity event observer
//!
//! Logs link availability, loss, and capability changes from the host's
//! optional connectivity feed. Same shape as the battery observer: a feed
//! that is absent makes install a warned no-op.

use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use metricflow_core::module::{ModuleError, MonitorModule};
use metricflow_core::ports::{
    IConnectivityEvents, IConnectivityObserver, IHostContext, LinkStatus,
};

const TARGET: &str = "metricflow::connectivity";

pub struct ConnectivityObserver {
    inner: Arc<ConnectivityInner>,
}

struct ConnectivityInner {
    installed: Mutex<bool>,
    events: Mutex<Option<Arc<dyn IConnectivityEvents>>>,
}

impl ConnectivityObserver {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ConnectivityInner {
                installed: Mutex::new(false),
                events: Mutex::new(None),
            }),
        }
    }
}

impl Default for ConnectivityObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorModule for ConnectivityObserver {
    fn name(&self) -> &'static str {
        "connectivity_observer"
    }

    fn install(&self, host: &Arc<dyn IHostContext>) -> Result<(), ModuleError> {
        {
            let mut installed = self.inner.installed.lock().unwrap_or_else(|e| e.into_inner());
            if *installed {
                warn!(target: TARGET, "connectivity observer already installed, skipping");
                return Ok(());
            }
            *installed = true;
        }

        let Some(events) = host.connectivity_events() else {
            warn!(target: TARGET, "host has no connectivity feed, observer idle");
            return Ok(());
        };

        events.register(Arc::clone(&self.inner) as Arc<dyn IConnectivityObserver>);
        *self.inner.events.lock().unwrap_or_else(|e| e.into_inner()) = Some(events);
        debug!(target: TARGET, "connectivity observer installed");
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
            let observer = Arc::clone(&self.inner) as Arc<dyn IConnectivityObserver>;
            if !events.unregister(&observer) {
                debug!(target: TARGET, "connectivity observer already unregistered");
            }
        }
        debug!(target: TARGET, "connectivity observer released");
    }
}

impl IConnectivityObserver for ConnectivityInner {
    fn on_link_available(&self, status: &LinkStatus) {
        info!(
            target: TARGET,
            transport = %status.transport,
            has_internet = status.has_internet,
            validated = status.validated,
            metered = status.metered,
            "network link available"
        );
    }

    fn on_link_lost(&self) {
        warn!(target: TARGET, "network link lost");
    }

    fn on_link_changed(&self, status: &LinkStatus) {
        info!(
            target: TARGET,
            transport = %status.transport,
            validated = status.validated,
            metered = status.metered,
            downlink_kbps = status.downlink_kbps.unwrap_or(0),
            "network link capabilities changed"
        );
    }
}
