//! # Emitter
//!
//! The core dispatch primitive.
//!
//! An [`Emitter`] owns an ordered listener set and drives synchronous fan-out.
//! Producers keep the emitter (the "fire" capability) and hand out
//! [`Emitter::event`] (the subscribe capability).
//!
//! ## Dispatch
//! ```text
//! fire(e)
//!   ├─ disposed or no listeners ──► no-op (no queue allocated)
//!   ├─ drain already running    ──► append snapshot to shared queue, return
//!   └─ otherwise                ──► build queue from snapshot, drain:
//!                                     pop (listener, payload)
//!                                     ├─► callback(&payload)
//!                                     │     └─ panic ──► ErrorSink, continue
//!                                     └─► until empty
//! ```
//!
//! ## Rules
//! - Listeners run strictly in subscription order.
//! - A listener added during a fire does not see the in-flight payload.
//! - A nested fire is appended to the running queue (breadth-first): its
//!   listeners run after the current snapshot is exhausted.
//! - Queue entries reference the listener record directly, so a listener
//!   released **after** being queued still runs for that payload. It is never
//!   invoked for later fires. This is kept deliberately; callers may rely on it.
//! - `dispose` is idempotent, makes later fires no-ops, and unsets the
//!   remaining subscription handles on the next scheduler turn.
//! - Dropping the last handle to an emitter unsets the remaining subscription
//!   handles immediately, so callbacks that hold their own subscription are
//!   freed with it.

use std::fmt;
use std::panic::{self, AssertUnwindSafe, Location};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::delivery::DeliveryQueue;
use super::leak::LeakageMonitor;
use super::listener::ListenerRecord;
use super::profiler::EventProfiling;
use super::source::{Callback, EventSource};
use crate::config::{EmitterOptions, Hook};
use crate::error::{DispatchError, panic_message, report};
use crate::lifecycle::{Disposable, Subscription};
use crate::scheduler;

struct State<E> {
    listeners: Vec<Arc<ListenerRecord<E>>>,
    /// Present only while a drain is running.
    delivery: Option<DeliveryQueue<E>>,
    disposed: bool,
}

pub(crate) struct EmitterInner<E> {
    options: EmitterOptions,
    state: Mutex<State<E>>,
    leak: Option<LeakageMonitor>,
    profiler: Option<EventProfiling>,
}

/// Typed event emitter with ordered, panic-isolated fan-out.
///
/// Clones share the same listener set.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use fanout::Emitter;
///
/// let total = Arc::new(AtomicU32::new(0));
/// let emitter = Emitter::<u32>::new();
///
/// let t = Arc::clone(&total);
/// let sub = emitter.event().subscribe(move |n| {
///     t.fetch_add(*n, Ordering::SeqCst);
/// });
///
/// emitter.fire(2);
/// emitter.fire(3);
/// sub.dispose();
/// emitter.fire(100);
///
/// assert_eq!(total.load(Ordering::SeqCst), 5);
/// ```
pub struct Emitter<E> {
    inner: Arc<EmitterInner<E>>,
}

/// Non-owning reference to an [`Emitter`], for hooks and forwarding callbacks.
pub struct WeakEmitter<E> {
    inner: Weak<EmitterInner<E>>,
}

impl<E> Clone for Emitter<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E> Clone for WeakEmitter<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<E: Send + Sync + 'static> Emitter<E> {
    /// Creates an emitter with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(EmitterOptions::default())
    }

    /// Creates an emitter with the given options.
    #[must_use]
    pub fn with_options(options: EmitterOptions) -> Self {
        Self {
            inner: Arc::new(EmitterInner::new(options)),
        }
    }

    /// Creates an emitter whose options may refer back to it.
    ///
    /// `build` receives a [`WeakEmitter`] that upgrades once construction is
    /// complete; hooks and forwarding callbacks capture it instead of a strong
    /// handle so the emitter can still be dropped.
    pub fn new_cyclic(build: impl FnOnce(&WeakEmitter<E>) -> EmitterOptions) -> Self {
        let inner = Arc::new_cyclic(|weak| {
            let options = build(&WeakEmitter {
                inner: Weak::clone(weak),
            });
            EmitterInner::new(options)
        });
        Self { inner }
    }

    /// The public subscribe capability of this emitter.
    pub fn event(&self) -> EventSource<E> {
        let inner = Arc::clone(&self.inner);
        EventSource::new(move |callback, site| EmitterInner::add_listener(&inner, callback, site))
    }

    /// Shorthand for `self.event().subscribe(callback)`.
    #[track_caller]
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        EmitterInner::add_listener(&self.inner, Arc::new(callback), Location::caller())
    }

    /// Delivers `event` to every current listener, in subscription order.
    ///
    /// No-op when disposed or when nobody listens.
    pub fn fire(&self, event: E) {
        let listener_count = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            if state.disposed || state.listeners.is_empty() {
                return;
            }
            let payload = Arc::new(event);
            if let Some(queue) = state.delivery.as_mut() {
                queue.enqueue(&state.listeners, payload);
                return;
            }
            let mut queue = DeliveryQueue::with_capacity(state.listeners.len());
            queue.enqueue(&state.listeners, payload);
            state.delivery = Some(queue);
            state.listeners.len()
        };

        if let Some(profiler) = &self.inner.profiler {
            profiler.start(listener_count);
        }
        self.inner.drain();
        if let Some(profiler) = &self.inner.profiler {
            profiler.stop();
        }
    }

    /// Detaches all listeners and turns later fires into no-ops. Idempotent.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Returns `true` after [`Emitter::dispose`].
    pub fn is_disposed(&self) -> bool {
        self.inner.state.lock().disposed
    }

    /// Number of live listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.state.lock().listeners.len()
    }

    /// Returns `true` if at least one listener is attached.
    pub fn has_listeners(&self) -> bool {
        !self.inner.state.lock().listeners.is_empty()
    }

    /// Non-owning handle to this emitter.
    pub fn downgrade(&self) -> WeakEmitter<E> {
        WeakEmitter {
            inner: Arc::downgrade(&self.inner),
        }
    }

    // ---------------------------
    // Crate-internal delivery API
    // ---------------------------

    /// Point-in-time copy of the listener set.
    pub(crate) fn snapshot(&self) -> Vec<Arc<ListenerRecord<E>>> {
        let state = self.inner.state.lock();
        if state.disposed {
            return Vec::new();
        }
        state.listeners.clone()
    }

    /// Invokes one listener with panic isolation; `false` if it panicked.
    pub(crate) fn deliver(&self, listener: &ListenerRecord<E>, payload: &E) -> bool {
        self.inner.deliver(listener, payload)
    }

    /// Reports `error` through this emitter's sink chain.
    pub(crate) fn report(&self, error: DispatchError) {
        report(self.inner.options.error_sink.as_ref(), error);
    }

    pub(crate) fn debug_name(&self) -> Option<Arc<str>> {
        self.inner.options.debug_name.clone()
    }

    #[cfg(test)]
    pub(crate) fn leak_warnings(&self) -> usize {
        self.inner.leak.as_ref().map_or(0, LeakageMonitor::warnings)
    }

    #[cfg(test)]
    pub(crate) fn profiled_fires(&self) -> u64 {
        self.inner
            .profiler
            .as_ref()
            .map_or(0, EventProfiling::invocations)
    }
}

impl<E: Send + Sync + 'static> WeakEmitter<E> {
    /// Upgrades to a full handle if the emitter is still alive.
    pub fn upgrade(&self) -> Option<Emitter<E>> {
        self.inner.upgrade().map(|inner| Emitter { inner })
    }

    /// Fires on the emitter if it is still alive.
    pub fn fire(&self, event: E) {
        if let Some(emitter) = self.upgrade() {
            emitter.fire(event);
        }
    }
}

impl<E> EmitterInner<E> {
    fn new(options: EmitterOptions) -> Self {
        let leak = LeakageMonitor::new(
            options.debug_name.clone(),
            options.resolved_leak_threshold(),
        );
        let profiler = options
            .profile
            .then(|| EventProfiling::new(options.debug_name.clone()));
        Self {
            options,
            state: Mutex::new(State {
                listeners: Vec::new(),
                delivery: None,
                disposed: false,
            }),
            leak,
            profiler,
        }
    }

    fn run_hook(hook: &Option<Hook>) {
        if let Some(hook) = hook {
            hook();
        }
    }
}

impl<E> Drop for EmitterInner<E> {
    fn drop(&mut self) {
        let listeners = std::mem::take(&mut self.state.get_mut().listeners);
        for record in listeners {
            record.unset_handle();
        }
    }
}

impl<E: Send + Sync + 'static> EmitterInner<E> {
    fn add_listener(
        this: &Arc<Self>,
        callback: Arc<Callback<E>>,
        site: &'static Location<'static>,
    ) -> Subscription {
        let first = {
            let state = this.state.lock();
            if state.disposed {
                return Subscription::empty();
            }
            state.listeners.is_empty()
        };
        if first {
            Self::run_hook(&this.options.on_will_add_first_listener);
        }

        let record = Arc::new(ListenerRecord::new(callback, site));
        let count = {
            let mut state = this.state.lock();
            if state.disposed {
                return Subscription::empty();
            }
            state.listeners.push(Arc::clone(&record));
            state.listeners.len()
        };

        if let Some(leak) = &this.leak {
            if leak.check(site, count, this.options.error_sink.as_ref()) {
                record.mark_tallied();
            }
        }

        let weak = Arc::downgrade(this);
        let owned = Arc::clone(&record);
        let sub = Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.remove_listener(&owned);
            }
        });
        record.bind_handle(sub.downgrade());

        if first {
            Self::run_hook(&this.options.on_did_add_first_listener);
        }
        Self::run_hook(&this.options.on_did_add_listener);
        sub
    }

    fn remove_listener(&self, record: &Arc<ListenerRecord<E>>) {
        let attached = self
            .state
            .lock()
            .listeners
            .iter()
            .any(|l| Arc::ptr_eq(l, record));
        if !attached {
            return;
        }
        Self::run_hook(&self.options.on_will_remove_listener);

        let now_empty = {
            let mut state = self.state.lock();
            let Some(pos) = state.listeners.iter().position(|l| Arc::ptr_eq(l, record)) else {
                return;
            };
            state.listeners.remove(pos);
            state.listeners.is_empty()
        };

        self.release_tally(record);
        if now_empty {
            Self::run_hook(&self.options.on_did_remove_last_listener);
        }
    }

    fn release_tally(&self, record: &ListenerRecord<E>) {
        if let Some(leak) = &self.leak {
            if record.take_tallied() {
                leak.release(record.site);
            }
        }
    }

    fn drain(&self) {
        loop {
            let next = {
                let mut state = self.state.lock();
                match state.delivery.as_mut().and_then(DeliveryQueue::pop) {
                    Some(delivery) => delivery,
                    None => {
                        state.delivery = None;
                        return;
                    }
                }
            };
            self.deliver(&next.listener, &next.payload);
        }
    }

    fn deliver(&self, listener: &ListenerRecord<E>, payload: &E) -> bool {
        let call = AssertUnwindSafe(|| (listener.callback)(payload));
        match panic::catch_unwind(call) {
            Ok(()) => true,
            Err(panic_err) => {
                report(
                    self.options.error_sink.as_ref(),
                    DispatchError::ListenerPanicked {
                        emitter: self.options.debug_name.clone(),
                        info: panic_message(panic_err.as_ref()),
                    },
                );
                false
            }
        }
    }

    fn dispose(&self) {
        let listeners = {
            let mut state = self.state.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            state.delivery = None;
            std::mem::take(&mut state.listeners)
        };

        for record in &listeners {
            self.release_tally(record);
        }
        if !listeners.is_empty() {
            scheduler::defer(move || {
                for record in listeners {
                    record.unset_handle();
                }
            });
        }
        Self::run_hook(&self.options.on_did_remove_last_listener);
    }
}

impl<E: Send + Sync + 'static> Default for Emitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Send + Sync + 'static> Disposable for Emitter<E> {
    fn dispose(&self) {
        Emitter::dispose(self);
    }
}

impl<E> fmt::Debug for Emitter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Emitter")
            .field("debug_name", &self.inner.options.debug_name)
            .field("listeners", &state.listeners.len())
            .field("disposed", &state.disposed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::tests::Collect;
    use crate::error::ErrorSink;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Log = Arc<Mutex<Vec<String>>>;

    fn log() -> Log {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn push(log: &Log, tag: &'static str) -> impl Fn(&u32) + Send + Sync + 'static {
        let log = Arc::clone(log);
        move |n| log.lock().push(format!("{tag}{n}"))
    }

    #[test]
    fn test_fire_without_listeners_is_noop() {
        let emitter = Emitter::<u32>::new();
        emitter.fire(1);
        assert!(emitter.inner.state.lock().delivery.is_none());
        assert!(!emitter.has_listeners());
    }

    #[test]
    fn test_listeners_run_in_subscription_order() {
        let log = log();
        let emitter = Emitter::<u32>::new();
        let _c = emitter.subscribe(push(&log, "c"));
        let _a = emitter.subscribe(push(&log, "a"));
        let _b = emitter.subscribe(push(&log, "b"));
        emitter.fire(1);
        assert_eq!(*log.lock(), vec!["c1", "a1", "b1"]);
    }

    #[test]
    fn test_listener_added_during_fire_sees_next_payload_only() {
        let log = log();
        let emitter = Emitter::<u32>::new();
        let held = Arc::new(Mutex::new(Vec::new()));

        let (e, l, h) = (emitter.clone(), Arc::clone(&log), Arc::clone(&held));
        let _first = emitter.subscribe(move |n| {
            l.lock().push(format!("first{n}"));
            if *n == 1 {
                h.lock().push(e.subscribe(push(&l, "late")));
            }
        });

        emitter.fire(1);
        emitter.fire(2);
        assert_eq!(*log.lock(), vec!["first1", "first2", "late2"]);
    }

    #[test]
    fn test_nested_fire_is_breadth_first() {
        let log = log();
        let emitter = Emitter::<u32>::new();

        let (e, l) = (emitter.clone(), Arc::clone(&log));
        let _a = emitter.subscribe(move |n| {
            l.lock().push(format!("a{n}"));
            if *n == 1 {
                e.fire(2);
                l.lock().push("a-after-nested".to_string());
            }
        });
        let _b = emitter.subscribe(push(&log, "b"));

        emitter.fire(1);
        assert_eq!(
            *log.lock(),
            vec!["a1", "a-after-nested", "b1", "a2", "b2"]
        );
    }

    #[test]
    fn test_released_while_queued_still_runs_for_inflight_payload() {
        let log = log();
        let emitter = Emitter::<u32>::new();
        let victim: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let v = Arc::clone(&victim);
        let l = Arc::clone(&log);
        let _killer = emitter.subscribe(move |n| {
            l.lock().push(format!("killer{n}"));
            if let Some(sub) = v.lock().as_ref() {
                sub.dispose();
            }
        });
        *victim.lock() = Some(emitter.subscribe(push(&log, "victim")));

        emitter.fire(1);
        emitter.fire(2);
        assert_eq!(*log.lock(), vec!["killer1", "victim1", "killer2"]);
        assert_eq!(emitter.listener_count(), 1);
    }

    #[test]
    fn test_panicking_listener_does_not_stop_delivery() {
        let log = log();
        let collect = Arc::new(Collect::default());
        let sink: Arc<dyn ErrorSink> = collect.clone();
        let emitter = Emitter::<u32>::with_options(
            EmitterOptions::new()
                .with_debug_name("faulty")
                .with_leak_warning_threshold(0)
                .with_error_sink(sink),
        );

        let _a = emitter.subscribe(push(&log, "a"));
        let _boom = emitter.subscribe(|_| panic!("listener exploded"));
        let _c = emitter.subscribe(push(&log, "c"));

        emitter.fire(1);
        assert_eq!(*log.lock(), vec!["a1", "c1"]);
        assert_eq!(collect.labels(), vec!["listener_panicked"]);
        assert_eq!(
            collect.messages(),
            vec!["listener panicked: listener exploded".to_string()]
        );
    }

    #[test]
    fn test_dispose_is_idempotent_and_silences_fire() {
        let removed_last = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&removed_last);
        let log = log();
        let emitter = Emitter::<u32>::with_options(
            EmitterOptions::new().on_did_remove_last_listener(move || {
                r.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let sub = emitter.subscribe(push(&log, "x"));

        emitter.dispose();
        emitter.dispose();
        emitter.fire(1);

        assert!(log.lock().is_empty());
        assert!(emitter.is_disposed());
        assert_eq!(removed_last.load(Ordering::SeqCst), 1);
        // No runtime: detachment happens inline.
        assert!(sub.is_disposed());
        assert!(emitter.subscribe(push(&log, "y")).is_disposed());
    }

    #[tokio::test]
    async fn test_dispose_unsets_handles_on_next_turn() {
        let emitter = Emitter::<u32>::new();
        let sub = emitter.subscribe(|_| {});
        emitter.dispose();
        assert!(!sub.is_disposed());
        assert_eq!(emitter.listener_count(), 0);

        tokio::task::yield_now().await;
        assert!(sub.is_disposed());
    }

    #[test]
    fn test_dispose_during_fire_drops_remaining_queue() {
        let log = log();
        let emitter = Emitter::<u32>::new();
        let e = emitter.clone();
        let _a = emitter.subscribe(move |_| e.dispose());
        let _b = emitter.subscribe(push(&log, "b"));
        emitter.fire(1);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_hooks_fire_in_order() {
        let log = log();
        let hook = |tag: &'static str| {
            let log = Arc::clone(&log);
            move || log.lock().push(tag.to_string())
        };
        let emitter = Emitter::<u32>::with_options(
            EmitterOptions::new()
                .on_will_add_first_listener(hook("will-first"))
                .on_did_add_first_listener(hook("did-first"))
                .on_did_add_listener(hook("did-add"))
                .on_will_remove_listener(hook("will-remove"))
                .on_did_remove_last_listener(hook("did-last")),
        );

        let a = emitter.subscribe(|_| {});
        let b = emitter.subscribe(|_| {});
        a.dispose();
        a.dispose();
        b.dispose();

        assert_eq!(
            *log.lock(),
            vec![
                "will-first",
                "did-first",
                "did-add",
                "did-add",
                "will-remove",
                "will-remove",
                "did-last"
            ]
        );
    }

    #[test]
    fn test_leak_monitor_warns_once_on_third_listener() {
        let collect = Arc::new(Collect::default());
        let sink: Arc<dyn ErrorSink> = collect.clone();
        let emitter = Emitter::<u32>::with_options(
            EmitterOptions::new()
                .with_leak_warning_threshold(2)
                .with_error_sink(sink),
        );

        let mut subs = Vec::new();
        for _ in 0..2 {
            subs.push(emitter.subscribe(|_| {}));
        }
        assert_eq!(emitter.leak_warnings(), 0);

        subs.push(emitter.subscribe(|_| {}));
        assert_eq!(emitter.leak_warnings(), 1);
        assert_eq!(collect.labels(), vec!["listener_leak"]);
        assert!(collect.messages()[0].contains(file!()));
    }

    #[test]
    fn test_global_threshold_applies_to_new_emitters() {
        let _serial = crate::error::tests::serial();
        let emitter = {
            let _guard = crate::config::set_global_leak_warning_threshold(1);
            Emitter::<u32>::with_options(
                EmitterOptions::new().with_error_sink(Arc::new(Collect::default())),
            )
        };
        let _a = emitter.subscribe(|_| {});
        let _b = emitter.subscribe(|_| {});
        assert_eq!(emitter.leak_warnings(), 1);
    }

    #[test]
    fn test_profiler_measures_top_level_fires_only() {
        let emitter = Emitter::<u32>::with_options(EmitterOptions::new().with_profiling());
        let e = emitter.clone();
        let _a = emitter.subscribe(move |n| {
            if *n == 0 {
                e.fire(1);
            }
        });
        emitter.fire(0);
        emitter.fire(5);
        assert_eq!(emitter.profiled_fires(), 2);
    }

    #[test]
    fn test_weak_emitter_stops_after_drop() {
        let emitter = Emitter::<u32>::new();
        let weak = emitter.downgrade();
        assert!(weak.upgrade().is_some());
        drop(emitter);
        assert!(weak.upgrade().is_none());
        weak.fire(1);
    }

    #[test]
    fn test_new_cyclic_hook_can_fire_self() {
        let log = log();
        let emitter = Emitter::<u32>::new_cyclic(|weak| {
            let weak = weak.clone();
            EmitterOptions::new().on_did_add_first_listener(move || weak.fire(42))
        });
        let _s = emitter.subscribe(push(&log, "v"));
        assert_eq!(*log.lock(), vec!["v42"]);
    }
}
