//! Notification surface for degraded-mode warnings.

use tracing::warn;

/// Receives non-blocking warnings from the cache, e.g. a toast or status bar.
///
/// Implementations must return promptly; the cache never waits on them.
pub trait Notifier: Send + Sync {
    fn warn(&self, message: &str);
}

/// Default notifier that forwards warnings to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn warn(&self, message: &str) {
        warn!(target: "tiered_cache::notify", "{}", message);
    }
}
