//! Listener callbacks and panic isolation.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tracing::error;

/// A shared, synchronously invoked callback.
pub type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Invokes one listener, containing any panic so the remaining listeners of
/// the same delivery still run.
///
/// Returns `false` when the listener panicked.
pub(crate) fn invoke_isolated<T: ?Sized>(
    listener: &(dyn Fn(&T) + Send + Sync),
    value: &T,
    context: &str,
) -> bool {
    match catch_unwind(AssertUnwindSafe(|| listener(value))) {
        Ok(()) => true,
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            error!(context = %context, reason = %reason, "Listener panicked; continuing delivery");
            false
        }
    }
}
