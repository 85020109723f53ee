//! # Turn-based deferral and single-shot timers.
//!
//! The emitters never block; they only postpone work:
//!
//! - [`defer`] runs a closure on the **next scheduler turn**. Inside a Tokio
//!   runtime this is a spawned task; outside a runtime the closure runs
//!   immediately (there is no later turn to wait for).
//! - [`Timer`] runs a closure once after a delay, and can be aborted or
//!   restarted. Requires a Tokio runtime.
//!
//! On a `current_thread` runtime a deferred closure runs after the current
//! task yields, which gives the "end of turn" batching the microtask emitter
//! relies on.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Runs `f` on the next scheduler turn, or immediately without a runtime.
pub(crate) fn defer(f: impl FnOnce() + Send + 'static) {
    match Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move { f() });
        }
        Err(_) => f(),
    }
}

/// Abortable single-shot delayed callback.
///
/// Dropping the timer aborts it.
#[derive(Debug, Default)]
pub(crate) struct Timer {
    handle: Option<JoinHandle<()>>,
}

impl Timer {
    /// An idle timer.
    pub(crate) fn new() -> Self {
        Self { handle: None }
    }

    /// Returns `true` while a callback is scheduled and has not finished.
    pub(crate) fn is_pending(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Schedules `f` after `delay`, aborting any previously scheduled callback.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub(crate) fn restart(&mut self, delay: Duration, f: impl FnOnce() + Send + 'static) {
        self.cancel();
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            f();
        }));
    }

    /// Aborts the scheduled callback, if any.
    pub(crate) fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Forgets the handle without aborting. Called from inside the callback.
    pub(crate) fn clear(&mut self) {
        self.handle = None;
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.cancel();
    }
}
