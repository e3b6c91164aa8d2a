//! Logging bootstrap
//!
//! The SDK emits everything through `tracing`; a host that already runs
//! its own subscriber keeps it. This bootstrap only installs a fallback
//! formatter when no global subscriber exists yet.

use tracing_subscriber::EnvFilter;

/// Install a formatted `tracing` subscriber with `RUST_LOG`-style
/// filtering, defaulting to `info`. A no-op when a subscriber is already
/// set (the host's wins).
pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init();
}
