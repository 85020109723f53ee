//! Error types and the process-wide error sink.
//!
//! This module defines:
//!
//! - [`DispatchError`] — faults observed while delivering events. They are
//!   **reported**, never returned to the firing caller.
//! - [`LateJoinError`] — a programming error returned by
//!   [`AsyncEvent::wait_until`](crate::AsyncEvent::wait_until) when a listener
//!   tries to join after its turn has ended.
//! - [`ErrorSink`] — where reported errors end up. An emitter uses its own sink
//!   if one was configured, otherwise the sink installed with [`set_error_sink`],
//!   otherwise [`LogSink`].
//!
//! ## Isolation
//! ```text
//! fire(e) ──► listener 1 ──► ok
//!         ├─► listener 2 ──► panic ──► catch_unwind ──► ErrorSink::on_error
//!         └─► listener 3 ──► ok          (delivery continues)
//! ```

use std::any::Any;
use std::panic::{self, AssertUnwindSafe, Location};
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

/// Boxed error returned by joined futures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Process-wide sink, `None` means [`LogSink`].
static GLOBAL_SINK: RwLock<Option<Arc<dyn ErrorSink>>> = RwLock::new(None);

/// # Faults observed during event delivery.
///
/// Every variant carries the emitter's debug name when one was configured.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum DispatchError {
    /// A listener panicked while handling an event. Remaining listeners still ran.
    #[error("listener panicked: {info}")]
    ListenerPanicked {
        /// Debug name of the emitter.
        emitter: Option<Arc<str>>,
        /// Panic payload rendered as text.
        info: String,
    },

    /// A future joined through `wait_until` resolved to an error.
    #[error("joined future failed: {error}")]
    JoinFailed {
        /// Debug name of the emitter.
        emitter: Option<Arc<str>>,
        /// The error the future resolved to.
        error: BoxError,
    },

    /// A future joined through `wait_until` panicked while being polled.
    #[error("joined future panicked: {info}")]
    JoinPanicked {
        /// Debug name of the emitter.
        emitter: Option<Arc<str>>,
        /// Panic payload rendered as text.
        info: String,
    },

    /// The leak monitor saw the listener count cross its threshold.
    #[error(
        "potential listener leak: {listeners} listeners attached; most frequent site {site} ({count})"
    )]
    ListenerLeak {
        /// Debug name of the emitter.
        emitter: Option<Arc<str>>,
        /// Live listeners at the time of the warning.
        listeners: usize,
        /// Most frequent subscribe call-site.
        site: &'static Location<'static>,
        /// Number of live subscriptions from `site`.
        count: usize,
    },
}

impl DispatchError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use fanout::DispatchError;
    ///
    /// let err = DispatchError::ListenerPanicked { emitter: None, info: "boom".into() };
    /// assert_eq!(err.as_label(), "listener_panicked");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            DispatchError::ListenerPanicked { .. } => "listener_panicked",
            DispatchError::JoinFailed { .. } => "join_failed",
            DispatchError::JoinPanicked { .. } => "join_panicked",
            DispatchError::ListenerLeak { .. } => "listener_leak",
        }
    }

    /// Debug name of the emitter that produced the error, if it had one.
    pub fn emitter(&self) -> Option<&str> {
        match self {
            DispatchError::ListenerPanicked { emitter, .. }
            | DispatchError::JoinFailed { emitter, .. }
            | DispatchError::JoinPanicked { emitter, .. }
            | DispatchError::ListenerLeak { emitter, .. } => emitter.as_deref(),
        }
    }
}

/// `wait_until` was called after the listener's synchronous turn returned.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("wait_until called after the listener returned; joins must happen synchronously")]
pub struct LateJoinError;

/// Destination for [`DispatchError`]s.
///
/// Implementations must not block; they are called inline from `fire`.
pub trait ErrorSink: Send + Sync + 'static {
    /// Handle a single reported error.
    fn on_error(&self, error: &DispatchError);

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Default sink: writes every error through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ErrorSink for LogSink {
    fn on_error(&self, error: &DispatchError) {
        match error {
            DispatchError::ListenerLeak { .. } => {
                tracing::warn!(
                    label = error.as_label(),
                    emitter = error.emitter().unwrap_or("unnamed"),
                    "{error}"
                );
            }
            _ => {
                tracing::error!(
                    label = error.as_label(),
                    emitter = error.emitter().unwrap_or("unnamed"),
                    "{error}"
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogSink"
    }
}

/// Restores the previously installed process-wide sink when dropped.
#[must_use = "the sink is uninstalled when the guard is dropped"]
pub struct ErrorSinkGuard {
    previous: Option<Arc<dyn ErrorSink>>,
}

impl Drop for ErrorSinkGuard {
    fn drop(&mut self) {
        *GLOBAL_SINK.write() = self.previous.take();
    }
}

/// Installs `sink` as the process-wide error sink until the guard is dropped.
///
/// Emitters configured with their own sink are not affected.
pub fn set_error_sink(sink: Arc<dyn ErrorSink>) -> ErrorSinkGuard {
    let previous = GLOBAL_SINK.write().replace(sink);
    ErrorSinkGuard { previous }
}

/// Routes `error` to `local`, the global sink, or [`LogSink`], in that order.
///
/// A panicking sink is caught and logged; nothing propagates to the caller.
pub(crate) fn report(local: Option<&Arc<dyn ErrorSink>>, error: DispatchError) {
    let sink = match local {
        Some(sink) => Arc::clone(sink),
        None => match GLOBAL_SINK.read().as_ref() {
            Some(sink) => Arc::clone(sink),
            None => {
                LogSink.on_error(&error);
                return;
            }
        },
    };

    if let Err(panic_err) = panic::catch_unwind(AssertUnwindSafe(|| sink.on_error(&error))) {
        tracing::error!(
            sink = sink.name(),
            panic = %panic_message(panic_err.as_ref()),
            "error sink panicked while handling {error}"
        );
    }
}

/// Renders a panic payload as text.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
