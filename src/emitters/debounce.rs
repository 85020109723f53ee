//! # DebounceEmitter
//!
//! Trailing-edge collapse of bursts.
//!
//! Built on [`PauseableEmitter`] with a mandatory merge function.
//!
//! ```text
//! fire(e) ─► timer idle?  ─► pause()
//!         ─► restart timer(delay)
//!         ─► queue e (paused)
//!
//! timer elapsed ─► resume() ─► dispatch(merge(burst)) once
//! ```
//!
//! A burst of fires, each closer than `delay` to the previous one, produces one
//! merged emission `delay` after the **last** fire.
//!
//! Requires a Tokio runtime: [`DebounceEmitter::fire`] panics outside one.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use super::pauseable::PauseableEmitter;
use crate::config::EmitterOptions;
use crate::emitter::EventSource;
use crate::lifecycle::{Disposable, Subscription};
use crate::scheduler::Timer;

struct TimerState {
    timer: Timer,
    /// Bumped on every restart; a stale callback compares and bails out.
    generation: u64,
}

struct DebounceInner<E> {
    pauseable: PauseableEmitter<E>,
    delay: Duration,
    timer: Mutex<TimerState>,
}

/// Emitter that merges bursts of fires into one trailing emission.
///
/// # Example
/// ```
/// # #[tokio::main(flavor = "current_thread", start_paused = true)]
/// # async fn main() {
/// use std::time::Duration;
/// use fanout::DebounceEmitter;
///
/// let emitter = DebounceEmitter::new(Duration::from_millis(50), |xs: Vec<u32>| xs.into_iter().sum());
/// let _sub = emitter.subscribe(|total| println!("batched total: {total}"));
/// emitter.fire(1);
/// emitter.fire(2);
/// tokio::time::sleep(Duration::from_millis(60)).await;
/// # }
/// ```
pub struct DebounceEmitter<E> {
    inner: Arc<DebounceInner<E>>,
}

impl<E> Clone for DebounceEmitter<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: Send + Sync + 'static> DebounceEmitter<E> {
    /// Creates a debounce emitter with default options.
    pub fn new<M>(delay: Duration, merge: M) -> Self
    where
        M: Fn(Vec<E>) -> E + Send + Sync + 'static,
    {
        Self::with_options(EmitterOptions::default(), delay, merge)
    }

    /// Creates a debounce emitter with the given options.
    pub fn with_options<M>(options: EmitterOptions, delay: Duration, merge: M) -> Self
    where
        M: Fn(Vec<E>) -> E + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(DebounceInner {
                pauseable: PauseableEmitter::with_options(options).with_merge(merge),
                delay,
                timer: Mutex::new(TimerState {
                    timer: Timer::new(),
                    generation: 0,
                }),
            }),
        }
    }

    /// The public subscribe capability.
    pub fn event(&self) -> EventSource<E> {
        self.inner.pauseable.event()
    }

    /// Shorthand for `self.event().subscribe(callback)`.
    #[track_caller]
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.inner.pauseable.subscribe(callback)
    }

    /// Returns `true` while a burst is being collected.
    pub fn is_pending(&self) -> bool {
        self.inner.timer.lock().timer.is_pending()
    }

    /// Queues `event` and (re)starts the debounce timer.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn fire(&self, event: E) {
        {
            let mut state = self.inner.timer.lock();
            if !state.timer.is_pending() {
                self.inner.pauseable.pause();
            }
            state.generation = state.generation.wrapping_add(1);
            let generation = state.generation;
            let weak = Arc::downgrade(&self.inner);
            state
                .timer
                .restart(self.inner.delay, move || Self::elapsed(&weak, generation));
        }
        self.inner.pauseable.fire(event);
    }

    /// Aborts a pending burst and disposes the underlying emitter.
    pub fn dispose(&self) {
        self.inner.timer.lock().timer.cancel();
        self.inner.pauseable.dispose();
    }

    fn elapsed(weak: &Weak<DebounceInner<E>>, generation: u64) {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        {
            let mut state = inner.timer.lock();
            if state.generation != generation {
                return;
            }
            state.timer.clear();
        }
        inner.pauseable.resume();
    }
}

impl<E: Send + Sync + 'static> Disposable for DebounceEmitter<E> {
    fn dispose(&self) {
        DebounceEmitter::dispose(self);
    }
}
