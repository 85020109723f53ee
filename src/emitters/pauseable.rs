//! # PauseableEmitter
//!
//! Counted pause with queued replay.
//!
//! ```text
//! pause()  ─► depth += 1
//! fire(e)  ─► depth > 0 ? (listeners ? queue.push(e) : drop) : dispatch(e)
//! resume() ─► depth -= 1
//!             └─ depth == 0:
//!                  merge set ─► dispatch(merge(queue)) once
//!                  otherwise ─► pop + dispatch one by one,
//!                               stop if a listener paused again
//! ```
//!
//! ## Rules
//! - `pause`/`resume` nest; only the outermost `resume` flushes.
//! - A `resume` without a matching `pause` is ignored.
//! - Payloads fired while nobody listens are dropped, as with [`Emitter::fire`].

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::EmitterOptions;
use crate::emitter::{Emitter, EventSource};
use crate::lifecycle::{Disposable, Subscription};

/// Combines a batch of queued payloads into one.
pub type MergeFn<E> = dyn Fn(Vec<E>) -> E + Send + Sync;

struct PauseState<E> {
    depth: usize,
    queue: VecDeque<E>,
}

/// Emitter that can hold back payloads while paused.
///
/// Clones share the pause depth, the queue and the listener set.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use parking_lot::Mutex;
/// use fanout::PauseableEmitter;
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let emitter = PauseableEmitter::<u32>::new();
/// let s = Arc::clone(&seen);
/// let _sub = emitter.subscribe(move |n| s.lock().push(*n));
///
/// emitter.pause();
/// emitter.fire(1);
/// emitter.fire(2);
/// assert!(seen.lock().is_empty());
/// emitter.resume();
/// assert_eq!(*seen.lock(), vec![1, 2]);
/// ```
pub struct PauseableEmitter<E> {
    emitter: Emitter<E>,
    state: Arc<Mutex<PauseState<E>>>,
    merge: Option<Arc<MergeFn<E>>>,
}

impl<E> Clone for PauseableEmitter<E> {
    fn clone(&self) -> Self {
        Self {
            emitter: self.emitter.clone(),
            state: Arc::clone(&self.state),
            merge: self.merge.clone(),
        }
    }
}

impl<E: Send + Sync + 'static> PauseableEmitter<E> {
    /// Creates an emitter with default options and no merge.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(EmitterOptions::default())
    }

    /// Creates an emitter with the given options and no merge.
    #[must_use]
    pub fn with_options(options: EmitterOptions) -> Self {
        Self {
            emitter: Emitter::with_options(options),
            state: Arc::new(Mutex::new(PauseState {
                depth: 0,
                queue: VecDeque::new(),
            })),
            merge: None,
        }
    }

    /// Collapses the queued batch into a single emission on resume.
    #[inline]
    pub fn with_merge<M>(mut self, merge: M) -> Self
    where
        M: Fn(Vec<E>) -> E + Send + Sync + 'static,
    {
        self.merge = Some(Arc::new(merge));
        self
    }

    /// The public subscribe capability.
    pub fn event(&self) -> EventSource<E> {
        self.emitter.event()
    }

    /// Shorthand for `self.event().subscribe(callback)`.
    #[track_caller]
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.emitter.subscribe(callback)
    }

    /// Returns `true` if at least one listener is attached.
    pub fn has_listeners(&self) -> bool {
        self.emitter.has_listeners()
    }

    /// Returns `true` while at least one `pause` is outstanding.
    pub fn is_paused(&self) -> bool {
        self.state.lock().depth > 0
    }

    /// Number of payloads waiting for `resume`.
    pub fn queued(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Starts (or nests) a pause.
    pub fn pause(&self) {
        self.state.lock().depth += 1;
    }

    /// Ends one pause; the outermost resume flushes the queue.
    pub fn resume(&self) {
        {
            let mut state = self.state.lock();
            if state.depth == 0 {
                return;
            }
            state.depth -= 1;
            if state.depth > 0 || state.queue.is_empty() {
                return;
            }
        }

        match &self.merge {
            Some(merge) => {
                let batch: Vec<E> = self.state.lock().queue.drain(..).collect();
                if !batch.is_empty() {
                    self.emitter.fire(merge(batch));
                }
            }
            None => loop {
                let next = {
                    let mut state = self.state.lock();
                    if state.depth > 0 {
                        break;
                    }
                    state.queue.pop_front()
                };
                match next {
                    Some(event) => self.emitter.fire(event),
                    None => break,
                }
            },
        }
    }

    /// Dispatches `event`, or queues it while paused.
    pub fn fire(&self, event: E) {
        {
            let mut state = self.state.lock();
            if state.depth > 0 {
                if self.emitter.has_listeners() {
                    state.queue.push_back(event);
                }
                return;
            }
        }
        self.emitter.fire(event);
    }

    /// Drops queued payloads and disposes the underlying emitter.
    pub fn dispose(&self) {
        self.state.lock().queue.clear();
        self.emitter.dispose();
    }
}

impl<E: Send + Sync + 'static> Default for PauseableEmitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Send + Sync + 'static> Disposable for PauseableEmitter<E> {
    fn dispose(&self) {
        PauseableEmitter::dispose(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder<E: Clone + Send + 'static>() -> (Arc<Mutex<Vec<E>>>, impl Fn(&E) + Send + Sync) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        (seen, move |e: &E| s.lock().push(e.clone()))
    }

    #[test]
    fn test_pause_replays_in_order() {
        let emitter = PauseableEmitter::<u32>::new();
        let (seen, listener) = recorder();
        let _sub = emitter.subscribe(listener);

        emitter.pause();
        emitter.fire(1);
        emitter.fire(2);
        assert_eq!(emitter.queued(), 2);
        emitter.resume();

        assert_eq!(*seen.lock(), vec![1, 2]);
        assert!(!emitter.is_paused());
    }

    #[test]
    fn test_merge_collapses_batch() {
        let emitter = PauseableEmitter::<usize>::new().with_merge(|xs| xs.len());
        let (seen, listener) = recorder();
        let _sub = emitter.subscribe(listener);

        emitter.pause();
        emitter.fire(10);
        emitter.fire(20);
        emitter.resume();

        assert_eq!(*seen.lock(), vec![2]);
    }

    #[test]
    fn test_nested_pause_flushes_on_outermost_resume() {
        let emitter = PauseableEmitter::<u32>::new();
        let (seen, listener) = recorder();
        let _sub = emitter.subscribe(listener);

        emitter.pause();
        emitter.pause();
        emitter.fire(1);
        emitter.resume();
        assert!(seen.lock().is_empty());
        emitter.resume();
        assert_eq!(*seen.lock(), vec![1]);

        emitter.resume();
        assert!(!emitter.is_paused());
    }

    #[test]
    fn test_fire_while_paused_without_listeners_is_dropped() {
        let emitter = PauseableEmitter::<u32>::new();
        emitter.pause();
        emitter.fire(1);
        assert_eq!(emitter.queued(), 0);

        let (seen, listener) = recorder();
        let _sub = emitter.subscribe(listener);
        emitter.resume();
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_listener_repausing_stops_flush() {
        let emitter = PauseableEmitter::<u32>::new();
        let (seen, listener) = recorder();
        let _sub = emitter.subscribe(listener);
        let e = emitter.clone();
        let _pauser = emitter.subscribe(move |n| {
            if *n == 1 {
                e.pause();
            }
        });

        emitter.pause();
        emitter.fire(1);
        emitter.fire(2);
        emitter.fire(3);
        emitter.resume();

        assert_eq!(*seen.lock(), vec![1]);
        assert_eq!(emitter.queued(), 2);

        emitter.resume();
        assert_eq!(*seen.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn test_dispose_drops_queue() {
        let emitter = PauseableEmitter::<u32>::new();
        let (seen, listener) = recorder();
        let _sub = emitter.subscribe(listener);
        emitter.pause();
        emitter.fire(1);
        emitter.dispose();
        emitter.resume();
        assert!(seen.lock().is_empty());
    }
}
