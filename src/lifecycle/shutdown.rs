//! Graceful stop for the listener and its background tasks.

use tokio::sync::broadcast;

/// One-shot stop signal fanned out to every subscriber.
///
/// Cloning shares the same signal; triggering any clone stops them all.
#[derive(Debug, Clone)]
pub struct Shutdown {
    notify: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (notify, _) = broadcast::channel(1);
        Self { notify }
    }

    /// A receiver that resolves once [`Shutdown::trigger`] is called.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.notify.subscribe()
    }

    /// Signal every subscriber. Triggering with no subscribers is a no-op.
    pub fn trigger(&self) {
        let notified = self.notify.send(()).unwrap_or(0);
        tracing::info!(subscribers = notified, "Shutdown requested");
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
