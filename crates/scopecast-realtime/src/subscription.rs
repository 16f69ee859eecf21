//! Cancellation handle returned by every subscribe-style operation.

use std::fmt;
use std::sync::Mutex;

type Cancel = Box<dyn FnOnce() + Send>;

/// Handle that removes a listener when [`Subscription::unsubscribe`] is called.
///
/// Cancellation is explicit: dropping the handle leaves the listener
/// registered. Calling `unsubscribe` more than once is a no-op.
#[must_use = "dropping a Subscription keeps the listener registered"]
pub struct Subscription {
    cancel: Mutex<Option<Cancel>>,
}

impl Subscription {
    /// Wraps a cancellation closure.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Mutex::new(Some(Box::new(cancel))),
        }
    }

    /// A handle with nothing to cancel.
    pub fn noop() -> Self {
        Self {
            cancel: Mutex::new(None),
        }
    }

    /// Removes the listener. Synchronous and immediate.
    pub fn unsubscribe(&self) {
        let cancel = self
            .cancel
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }

    /// Whether `unsubscribe` has not been called yet.
    pub fn is_active(&self) -> bool {
        self.cancel
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
