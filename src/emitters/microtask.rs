//! # MicrotaskEmitter
//!
//! End-of-turn batching.
//!
//! The first `fire` of a batch schedules one flush on the next scheduler turn
//! (see [`scheduler::defer`](crate::scheduler)); later fires only append. The
//! flush dispatches either one merged value or every payload in order.
//!
//! Outside a Tokio runtime there is no later turn, so each fire flushes
//! immediately.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::pauseable::MergeFn;
use crate::config::EmitterOptions;
use crate::emitter::{Emitter, EventSource};
use crate::lifecycle::{Disposable, Subscription};
use crate::scheduler;

struct MicrotaskInner<E> {
    emitter: Emitter<E>,
    batch: Mutex<Vec<E>>,
    merge: Option<Arc<MergeFn<E>>>,
}

/// Emitter that delivers everything fired within one turn at the end of it.
pub struct MicrotaskEmitter<E> {
    inner: Arc<MicrotaskInner<E>>,
}

impl<E> Clone for MicrotaskEmitter<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: Send + Sync + 'static> MicrotaskEmitter<E> {
    /// Creates an emitter that replays every payload individually.
    #[must_use]
    pub fn new() -> Self {
        Self::build(EmitterOptions::default(), None)
    }

    /// Creates an emitter with the given options.
    #[must_use]
    pub fn with_options(options: EmitterOptions) -> Self {
        Self::build(options, None)
    }

    /// Creates an emitter that dispatches one merged value per batch.
    pub fn with_merge<M>(options: EmitterOptions, merge: M) -> Self
    where
        M: Fn(Vec<E>) -> E + Send + Sync + 'static,
    {
        Self::build(options, Some(Arc::new(merge)))
    }

    fn build(options: EmitterOptions, merge: Option<Arc<MergeFn<E>>>) -> Self {
        Self {
            inner: Arc::new(MicrotaskInner {
                emitter: Emitter::with_options(options),
                batch: Mutex::new(Vec::new()),
                merge,
            }),
        }
    }

    /// The public subscribe capability.
    pub fn event(&self) -> EventSource<E> {
        self.inner.emitter.event()
    }

    /// Shorthand for `self.event().subscribe(callback)`.
    #[track_caller]
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.inner.emitter.subscribe(callback)
    }

    /// Appends `event` to the current batch.
    pub fn fire(&self, event: E) {
        let first = {
            let mut batch = self.inner.batch.lock();
            batch.push(event);
            batch.len() == 1
        };
        if first {
            let weak = Arc::downgrade(&self.inner);
            scheduler::defer(move || Self::flush(&weak));
        }
    }

    /// Drops the pending batch and disposes the underlying emitter.
    pub fn dispose(&self) {
        self.inner.batch.lock().clear();
        self.inner.emitter.dispose();
    }

    fn flush(weak: &Weak<MicrotaskInner<E>>) {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        let batch = std::mem::take(&mut *inner.batch.lock());
        if batch.is_empty() {
            return;
        }
        match &inner.merge {
            Some(merge) => inner.emitter.fire(merge(batch)),
            None => {
                for event in batch {
                    inner.emitter.fire(event);
                }
            }
        }
    }
}

impl<E: Send + Sync + 'static> Default for MicrotaskEmitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Send + Sync + 'static> Disposable for MicrotaskEmitter<E> {
    fn dispose(&self) {
        MicrotaskEmitter::dispose(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_batch_is_delivered_at_end_of_turn() {
        let emitter = MicrotaskEmitter::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let _sub = emitter.subscribe(move |n| s.lock().push(*n));

        emitter.fire(1);
        emitter.fire(2);
        emitter.fire(3);
        assert!(seen.lock().is_empty());

        tokio::task::yield_now().await;
        assert_eq!(*seen.lock(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_merge_delivers_one_value_per_batch() {
        let emitter =
            MicrotaskEmitter::with_merge(EmitterOptions::new(), |xs: Vec<u32>| xs.iter().sum());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let _sub = emitter.subscribe(move |n| s.lock().push(*n));

        emitter.fire(1);
        emitter.fire(2);
        tokio::task::yield_now().await;
        emitter.fire(10);
        tokio::task::yield_now().await;

        assert_eq!(*seen.lock(), vec![3, 10]);
    }

    #[test]
    fn test_without_runtime_flushes_immediately() {
        let emitter = MicrotaskEmitter::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let _sub = emitter.subscribe(move |n| s.lock().push(*n));
        emitter.fire(4);
        assert_eq!(*seen.lock(), vec![4]);
    }
}
