//! # Emitter configuration.
//!
//! Provides [`EmitterOptions`], the per-instance settings of an
//! [`Emitter`](crate::Emitter), and the process-wide leak warning threshold.
//!
//! ## Sentinel values
//! - leak threshold `0` → leak monitoring disabled
//! - `leak_warning_threshold = None` → use the process-wide threshold
//!
//! The process-wide threshold is resolved when an emitter is **created**;
//! changing it later does not affect existing emitters.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::ErrorSink;

/// Process-wide leak warning threshold (`0` = disabled).
static GLOBAL_LEAK_THRESHOLD: AtomicUsize = AtomicUsize::new(0);

/// Lifecycle hook invoked by the emitter.
pub type Hook = Arc<dyn Fn() + Send + Sync>;

/// Per-emitter configuration.
///
/// ## Hooks
/// Hooks run synchronously and outside the emitter's internal lock, so they may
/// subscribe to other sources or fire the emitter they belong to.
///
/// ```text
/// subscribe ─► on_will_add_first_listener (if first)
///           ─► listener appended
///           ─► on_did_add_first_listener  (if first)
///           ─► on_did_add_listener
/// release   ─► on_will_remove_listener
///           ─► listener removed
///           ─► on_did_remove_last_listener (if now empty)
/// ```
#[derive(Clone, Default)]
pub struct EmitterOptions {
    /// Name used in leak warnings, profiling lines and reported errors.
    pub debug_name: Option<Arc<str>>,

    /// Per-instance leak threshold.
    ///
    /// - `None` → process-wide threshold at creation time
    /// - `Some(0)` → disabled for this emitter
    pub leak_warning_threshold: Option<usize>,

    /// Log elapsed time and listener count of every `fire`.
    pub profile: bool,

    /// Sink for listener faults of this emitter; falls back to the process-wide sink.
    pub error_sink: Option<Arc<dyn ErrorSink>>,

    pub(crate) on_will_add_first_listener: Option<Hook>,
    pub(crate) on_did_add_first_listener: Option<Hook>,
    pub(crate) on_did_add_listener: Option<Hook>,
    pub(crate) on_will_remove_listener: Option<Hook>,
    pub(crate) on_did_remove_last_listener: Option<Hook>,
}

impl EmitterOptions {
    /// All-off options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a debug name.
    #[inline]
    pub fn with_debug_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.debug_name = Some(name.into());
        self
    }

    /// Overrides the leak threshold (`0` disables).
    #[inline]
    pub fn with_leak_warning_threshold(mut self, threshold: usize) -> Self {
        self.leak_warning_threshold = Some(threshold);
        self
    }

    /// Enables per-fire profiling.
    #[inline]
    pub fn with_profiling(mut self) -> Self {
        self.profile = true;
        self
    }

    /// Routes this emitter's faults to `sink`.
    #[inline]
    pub fn with_error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.error_sink = Some(sink);
        self
    }

    /// Runs `hook` before the first listener is added.
    #[inline]
    pub fn on_will_add_first_listener(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_will_add_first_listener = Some(Arc::new(hook));
        self
    }

    /// Runs `hook` after the first listener was added.
    #[inline]
    pub fn on_did_add_first_listener(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_did_add_first_listener = Some(Arc::new(hook));
        self
    }

    /// Runs `hook` after every added listener.
    #[inline]
    pub fn on_did_add_listener(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_did_add_listener = Some(Arc::new(hook));
        self
    }

    /// Runs `hook` before a listener is removed.
    #[inline]
    pub fn on_will_remove_listener(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_will_remove_listener = Some(Arc::new(hook));
        self
    }

    /// Runs `hook` after the last listener left, and once on disposal.
    #[inline]
    pub fn on_did_remove_last_listener(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_did_remove_last_listener = Some(Arc::new(hook));
        self
    }

    /// Effective leak threshold: per-instance override, else the process-wide value.
    #[inline]
    pub fn resolved_leak_threshold(&self) -> usize {
        self.leak_warning_threshold
            .unwrap_or_else(global_leak_warning_threshold)
    }
}

impl fmt::Debug for EmitterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmitterOptions")
            .field("debug_name", &self.debug_name)
            .field("leak_warning_threshold", &self.leak_warning_threshold)
            .field("profile", &self.profile)
            .field("error_sink", &self.error_sink.as_ref().map(|s| s.name()))
            .finish_non_exhaustive()
    }
}

/// Current process-wide leak threshold (`0` = disabled).
pub fn global_leak_warning_threshold() -> usize {
    GLOBAL_LEAK_THRESHOLD.load(Ordering::Relaxed)
}

/// Restores the previous process-wide leak threshold when dropped.
#[must_use = "the threshold is restored when the guard is dropped"]
#[derive(Debug)]
pub struct LeakThresholdGuard {
    previous: usize,
}

impl Drop for LeakThresholdGuard {
    fn drop(&mut self) {
        GLOBAL_LEAK_THRESHOLD.store(self.previous, Ordering::Relaxed);
    }
}

/// Sets the process-wide leak threshold until the guard is dropped.
///
/// # Example
/// ```
/// use fanout::{global_leak_warning_threshold, set_global_leak_warning_threshold};
///
/// let before = global_leak_warning_threshold();
/// {
///     let _guard = set_global_leak_warning_threshold(175);
///     assert_eq!(global_leak_warning_threshold(), 175);
/// }
/// assert_eq!(global_leak_warning_threshold(), before);
/// ```
pub fn set_global_leak_warning_threshold(threshold: usize) -> LeakThresholdGuard {
    let previous = GLOBAL_LEAK_THRESHOLD.swap(threshold, Ordering::Relaxed);
    LeakThresholdGuard { previous }
}
