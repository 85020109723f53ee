//! Time- and turn-aware combinators: `debounced_listener`, `debounce`, `buffer`.
//!
//! All three need a Tokio runtime once events start flowing; `buffer` with
//! `flush_after_timeout = false` is the exception.

use std::panic::{self, AssertUnwindSafe, Location};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::EmitterOptions;
use crate::emitter::{Callback, Emitter, EventSource, WeakEmitter};
use crate::error::{DispatchError, panic_message, report};
use crate::lifecycle::Subscription;
use crate::scheduler::{self, Timer};

/// Accumulates events into one value.
pub type ReduceFn<I, O> = dyn Fn(Option<O>, &I) -> O + Send + Sync;

struct Debounced<O> {
    output: Option<O>,
    calls: usize,
    timer: Timer,
    generation: u64,
}

struct DebouncedListener<O> {
    handler: Arc<Callback<O>>,
    leading: bool,
    state: Mutex<Debounced<O>>,
}

impl<O: Send + 'static> DebouncedListener<O> {
    fn on_event(this: &Arc<Self>, next: O, delay: Duration) {
        let leading = {
            let mut state = this.state.lock();
            state.calls += 1;
            let leading = this.leading && !state.timer.is_pending();
            state.generation = state.generation.wrapping_add(1);
            let generation = state.generation;
            let weak = Arc::downgrade(this);
            state
                .timer
                .restart(delay, move || Self::elapsed(&weak, generation));
            if leading {
                Some(next)
            } else {
                state.output = Some(next);
                None
            }
        };
        if let Some(value) = leading {
            (this.handler)(&value);
        }
    }

    fn elapsed(weak: &Weak<Self>, generation: u64) {
        let Some(this) = weak.upgrade() else {
            return;
        };
        let (output, calls) = {
            let mut state = this.state.lock();
            if state.generation != generation {
                return;
            }
            state.timer.clear();
            (state.output.take(), std::mem::take(&mut state.calls))
        };
        if !this.leading || calls > 1 {
            if let Some(value) = output {
                this.deliver_trailing(&value);
            }
        }
    }

    /// Runs on the timer task, so a panic is reported here instead of
    /// unwinding into the runtime.
    fn deliver_trailing(&self, value: &O) {
        let call = AssertUnwindSafe(|| (self.handler)(value));
        if let Err(panic_err) = panic::catch_unwind(call) {
            report(
                None,
                DispatchError::ListenerPanicked {
                    emitter: None,
                    info: panic_message(panic_err.as_ref()),
                },
            );
        }
    }
}

/// Subscribes `handler` to `source` through a debounce window.
///
/// Each event is folded into the pending value with `merge`. The value is
/// handed to `handler` once `delay` passed without a new event. With
/// `leading`, the first event of a burst is delivered at once and the trailing
/// delivery only happens if more events followed it.
///
/// No intermediate [`Emitter`] is created.
///
/// # Panics
///
/// The returned listener panics on its first event when no Tokio runtime is
/// running.
#[track_caller]
pub fn debounced_listener<I, O, M, H>(
    source: &EventSource<I>,
    merge: M,
    delay: Duration,
    leading: bool,
    handler: H,
) -> Subscription
where
    I: 'static,
    O: Send + 'static,
    M: Fn(Option<O>, &I) -> O + Send + Sync + 'static,
    H: Fn(&O) + Send + Sync + 'static,
{
    debounced_listener_at(
        source,
        Arc::new(merge),
        delay,
        leading,
        Arc::new(handler),
        Location::caller(),
    )
}

fn debounced_listener_at<I, O>(
    source: &EventSource<I>,
    merge: Arc<ReduceFn<I, O>>,
    delay: Duration,
    leading: bool,
    handler: Arc<Callback<O>>,
    site: &'static Location<'static>,
) -> Subscription
where
    I: 'static,
    O: Send + 'static,
{
    let listener = Arc::new(DebouncedListener {
        handler,
        leading,
        state: Mutex::new(Debounced {
            output: None,
            calls: 0,
            timer: Timer::new(),
            generation: 0,
        }),
    });

    let l = Arc::clone(&listener);
    let upstream = source.subscribe_at(
        Arc::new(move |event: &I| {
            let previous = l.state.lock().output.take();
            let next = merge(previous, event);
            DebouncedListener::on_event(&l, next, delay);
        }),
        site,
    );

    Subscription::new(move || {
        upstream.dispose();
        listener.state.lock().timer.cancel();
    })
}

/// Debounced view of `source`, built on [`debounced_listener`].
///
/// Upstream is only subscribed while the returned source has listeners.
#[track_caller]
pub fn debounce<I, O, M>(
    source: EventSource<I>,
    merge: M,
    delay: Duration,
    leading: bool,
) -> EventSource<O>
where
    I: 'static,
    O: Clone + Send + Sync + 'static,
    M: Fn(Option<O>, &I) -> O + Send + Sync + 'static,
{
    let site = Location::caller();
    let merge: Arc<ReduceFn<I, O>> = Arc::new(merge);
    let upstream: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

    let emitter = Emitter::new_cyclic(|weak: &WeakEmitter<O>| {
        let target = weak.clone();
        let hooked = Arc::clone(&upstream);
        let released = Arc::clone(&upstream);
        EmitterOptions::new()
            .on_will_add_first_listener(move || {
                let target = target.clone();
                let sub = debounced_listener_at(
                    &source,
                    Arc::clone(&merge),
                    delay,
                    leading,
                    Arc::new(move |value: &O| target.fire(value.clone())),
                    site,
                );
                if let Some(previous) = hooked.lock().replace(sub) {
                    previous.dispose();
                }
            })
            .on_did_remove_last_listener(move || {
                if let Some(sub) = released.lock().take() {
                    sub.dispose();
                }
            })
    });
    emitter.event()
}

struct BufferState<E> {
    /// `None` once flushed; later events pass straight through.
    buffered: Option<Vec<E>>,
    upstream: Option<Subscription>,
}

/// Buffers emissions until the returned source gets its first listener.
///
/// `source` is subscribed **immediately**, starting with `initial` already
/// buffered. On the first downstream listener the buffer is flushed, right
/// away or on the next scheduler turn when `flush_after_timeout` is set; after
/// that events pass through unbuffered.
///
/// Leak-prone: the eager upstream subscription stays attached until the
/// returned source gains and then loses its last listener.
#[track_caller]
pub fn buffer<E>(
    source: EventSource<E>,
    flush_after_timeout: bool,
    initial: Vec<E>,
) -> EventSource<E>
where
    E: Clone + Send + Sync + 'static,
{
    let site = Location::caller();
    let state = Arc::new(Mutex::new(BufferState {
        buffered: Some(initial),
        upstream: None,
    }));

    let emitter = Emitter::new_cyclic(|weak: &WeakEmitter<E>| {
        let (on_will_add, on_did_add, on_last) =
            (Arc::clone(&state), Arc::clone(&state), Arc::clone(&state));
        let (forward_to, flush_to) = (weak.clone(), weak.clone());
        let source = source.clone();
        EmitterOptions::new()
            .on_will_add_first_listener(move || {
                if on_will_add.lock().upstream.is_some() {
                    return;
                }
                let target = forward_to.clone();
                let sub = source.subscribe_at(
                    Arc::new(move |event: &E| target.fire(event.clone())),
                    site,
                );
                if let Some(stale) = on_will_add.lock().upstream.replace(sub) {
                    stale.dispose();
                }
            })
            .on_did_add_first_listener(move || {
                if on_did_add.lock().buffered.is_none() {
                    return;
                }
                let (state, target) = (Arc::clone(&on_did_add), flush_to.clone());
                let flush = move || flush_buffer(&state, &target);
                if flush_after_timeout {
                    scheduler::defer(flush);
                } else {
                    flush();
                }
            })
            .on_did_remove_last_listener(move || {
                let upstream = on_last.lock().upstream.take();
                if let Some(sub) = upstream {
                    sub.dispose();
                }
            })
    });

    let buffering = Arc::clone(&state);
    let target = emitter.downgrade();
    let eager = source.subscribe_at(
        Arc::new(move |event: &E| {
            let mut state = buffering.lock();
            match state.buffered.as_mut() {
                Some(buffered) => buffered.push(event.clone()),
                None => {
                    drop(state);
                    target.fire(event.clone());
                }
            }
        }),
        site,
    );
    state.lock().upstream = Some(eager);
    emitter.event()
}

fn flush_buffer<E>(state: &Mutex<BufferState<E>>, target: &WeakEmitter<E>)
where
    E: Send + Sync + 'static,
{
    let pending = state.lock().buffered.take();
    for event in pending.into_iter().flatten() {
        target.fire(event);
    }
}
