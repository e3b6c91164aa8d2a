//! Foreground-surface lifecycle port (driven/secondary port)
//!
//! The host owns its UI surfaces and their lifetimes; the SDK only ever
//! observes them. Surfaces are handed to observers as `Arc<dyn
//! IForegroundSurface>` so consumers can downgrade to a `Weak` and hold a
//! relation without ownership: the SDK must never extend a surface's
//! lifetime.
//!
//! ## Design Notes
//!
//! - Surface identity is pointer identity (`Arc::ptr_eq`). The host must
//!   pass the same `Arc` for the same surface across resume/pause pairs.
//! - Dispatch may happen on any host thread; observers must be internally
//!   synchronized.
//! - `unregister` matches by observer pointer identity.

use std::sync::Arc;

/// A host UI surface currently or previously in the foreground.
///
/// Deliberately minimal: the SDK only needs a label for log lines and a
/// stable identity for tracking.
pub trait IForegroundSurface: Send + Sync {
    /// Short human-readable name, e.g. the screen or window title.
    fn name(&self) -> &str;
}

/// Receives resume/pause callbacks for foreground surfaces.
pub trait ILifecycleObserver: Send + Sync {
    fn on_surface_resumed(&self, surface: &Arc<dyn IForegroundSurface>);
    fn on_surface_paused(&self, surface: &Arc<dyn IForegroundSurface>);
}

/// Registration surface for lifecycle callbacks.
pub trait ILifecycleEvents: Send + Sync {
    fn register(&self, observer: Arc<dyn ILifecycleObserver>);

    /// Remove a previously registered observer. Removing an observer that
    /// was never registered returns `false` and is not an error.
    fn unregister(&self, observer: &Arc<dyn ILifecycleObserver>) -> bool;
}
