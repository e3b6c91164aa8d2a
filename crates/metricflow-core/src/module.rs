//! The uniform contract between the orchestrator and every monitoring
//! feature.
//!
//! The orchestrator never inspects a module's internals: it holds a
//! declarative ordered list of `MonitorModule` instances and drives them
//! through exactly two operations. Each module owns its own `installed`
//! flag behind its own lock; double-install and double-release are the
//! module's business to tolerate.

use std::sync::Arc;

use thiserror::Error;

use crate::ports::IHostContext;

/// Errors a module may raise from `install`.
///
/// These are caught, logged, and swallowed by the orchestrator so one
/// module's failure never prevents its siblings from being attempted.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// The module-local configuration slice violates an invariant.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A background thread could not be spawned; fatal to this module's
    /// install and rolls back its installed flag.
    #[error("failed to spawn {thread} thread")]
    Spawn {
        thread: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// Adapter-specific setup failure (subprocess spawn, host registration).
    #[error(transparent)]
    Adapter(#[from] anyhow::Error),
}

/// An independently installable/releasable monitoring feature.
///
/// ## Contract
///
/// - `install` may fail with an unrecoverable setup error; the caller logs
///   it and moves on. A second `install` while installed is a warned no-op.
/// - `release` is best-effort and must never panic; releasing a module
///   that was never installed is a no-op.
/// - Both operations may be called from any thread.
pub trait MonitorModule: Send + Sync {
    /// Stable name used as the logging component tag.
    fn name(&self) -> &'static str;

    /// Activate the module against the given host.
    fn install(&self, host: &Arc<dyn IHostContext>) -> Result<(), ModuleError>;

    /// Tear the module down and drop host registrations.
    fn release(&self);
}
