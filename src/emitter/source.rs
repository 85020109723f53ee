//! # Event sources
//!
//! [`EventSource`] is the public, subscribe-only half of an emitter. It is a
//! cloneable capability: every `subscribe` call produces an independent
//! [`Subscription`].
//!
//! Combinators and routing types build new sources by wrapping the subscribe
//! function of existing ones; the call-site captured by `subscribe` travels
//! along so leak warnings point at user code.

use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use crate::lifecycle::{DisposableStore, Subscription};

/// Listener callback.
pub type Callback<E> = dyn Fn(&E) + Send + Sync;

type SubscribeFn<E> =
    dyn Fn(Arc<Callback<E>>, &'static Location<'static>) -> Subscription + Send + Sync;

/// Subscribe capability for events of type `E`.
///
/// # Example
/// ```
/// use fanout::Emitter;
///
/// let emitter = Emitter::<u32>::new();
/// let source = emitter.event();
/// let sub = source.subscribe(|n| println!("got {n}"));
/// emitter.fire(7);
/// sub.dispose();
/// ```
pub struct EventSource<E> {
    subscribe: Arc<SubscribeFn<E>>,
}

impl<E> Clone for EventSource<E> {
    fn clone(&self) -> Self {
        Self {
            subscribe: Arc::clone(&self.subscribe),
        }
    }
}

impl<E: 'static> EventSource<E> {
    /// Builds a source from a raw subscribe function.
    ///
    /// The function receives the listener and the call-site of the outermost
    /// `subscribe`, and must return a handle that detaches the listener.
    pub fn new<F>(subscribe: F) -> Self
    where
        F: Fn(Arc<Callback<E>>, &'static Location<'static>) -> Subscription + Send + Sync + 'static,
    {
        Self {
            subscribe: Arc::new(subscribe),
        }
    }

    /// A source that never fires.
    pub fn none() -> Self {
        Self::new(|_, _| Subscription::empty())
    }

    /// Registers `callback`; returns its release handle.
    #[track_caller]
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        (self.subscribe)(Arc::new(callback), Location::caller())
    }

    /// Registers `callback` and also adds its handle to `store`.
    #[track_caller]
    pub fn subscribe_into<F>(&self, callback: F, store: &DisposableStore) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let sub = (self.subscribe)(Arc::new(callback), Location::caller());
        store.add(sub.clone());
        sub
    }

    /// Registers an already shared callback with an explicit call-site.
    ///
    /// Used when forwarding a subscription from one source to another.
    pub fn subscribe_at(
        &self,
        callback: Arc<Callback<E>>,
        site: &'static Location<'static>,
    ) -> Subscription {
        (self.subscribe)(callback, site)
    }
}

impl<E> fmt::Debug for EventSource<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSource").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_none_never_fires() {
        let sub = EventSource::<u8>::none().subscribe(|_| panic!("must not fire"));
        assert!(sub.is_disposed());
    }

    #[test]
    fn test_subscribe_passes_caller_location() {
        let seen = Arc::new(Mutex::new(None));
        let s = Arc::clone(&seen);
        let source = EventSource::<u8>::new(move |_, site| {
            *s.lock() = Some(site.file());
            Subscription::empty()
        });
        let _sub = source.subscribe(|_| {});
        assert_eq!(*seen.lock(), Some(file!()));
    }

    #[test]
    fn test_subscribe_into_registers_handle() {
        let store = DisposableStore::new();
        let source = EventSource::<u8>::new(|_, _| Subscription::new(|| {}));
        let sub = source.subscribe_into(|_| {}, &store);
        assert_eq!(store.len(), 1);
        store.dispose();
        assert!(sub.is_disposed());
    }
}
