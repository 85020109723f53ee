//! # EventMultiplexer
//!
//! Dynamic fan-in.
//!
//! Merges any number of upstream sources into one downstream source. Sources
//! can be added and removed at any time.
//!
//! ```text
//!  source A ─┐
//!  source B ─┼─► multiplexer emitter ─► downstream listeners
//!  source C ─┘
//! ```
//!
//! ## Rules
//! - Upstream sources are subscribed **only** while the multiplexer has at
//!   least one downstream listener.
//! - First downstream listener ─► hook every tracked source.
//! - Last downstream listener leaves ─► unhook every tracked source.
//! - Releasing the handle returned by [`EventMultiplexer::add`] unhooks that
//!   source and forgets it.

use std::panic::Location;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::config::EmitterOptions;
use crate::emitter::{Callback, Emitter, EventSource};
use crate::lifecycle::{Disposable, Subscription};

struct Tracked<E> {
    id: u64,
    source: EventSource<E>,
    site: &'static Location<'static>,
    live: Option<Subscription>,
}

struct MuxState<E> {
    entries: Vec<Tracked<E>>,
    hooked: bool,
    next_id: u64,
}

struct MuxInner<E> {
    emitter: Emitter<E>,
    forward: Arc<Callback<E>>,
    state: Mutex<MuxState<E>>,
}

/// Fan-in over a changing set of sources.
///
/// # Example
/// ```
/// use fanout::{Emitter, EventMultiplexer};
///
/// let a = Emitter::<u32>::new();
/// let b = Emitter::<u32>::new();
/// let mux = EventMultiplexer::new();
/// let _ha = mux.add(a.event());
/// let _hb = mux.add(b.event());
///
/// let _sub = mux.event().subscribe(|n| println!("from any: {n}"));
/// a.fire(1);
/// b.fire(2);
/// ```
pub struct EventMultiplexer<E> {
    inner: Arc<MuxInner<E>>,
}

impl<E: Clone + Send + Sync + 'static> EventMultiplexer<E> {
    /// Creates an empty multiplexer.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(EmitterOptions::default())
    }

    /// Creates an empty multiplexer; `options` configure the downstream emitter.
    ///
    /// Hooks set on `options` are replaced.
    #[must_use]
    pub fn with_options(options: EmitterOptions) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<MuxInner<E>>| {
            let on_first = Weak::clone(weak);
            let on_last = Weak::clone(weak);
            let emitter = Emitter::with_options(
                options
                    .on_will_add_first_listener(move || {
                        if let Some(inner) = on_first.upgrade() {
                            inner.hook();
                        }
                    })
                    .on_did_remove_last_listener(move || {
                        if let Some(inner) = on_last.upgrade() {
                            inner.unhook();
                        }
                    }),
            );
            let target = emitter.downgrade();
            let forward: Arc<Callback<E>> = Arc::new(move |event: &E| target.fire(event.clone()));
            MuxInner {
                emitter,
                forward,
                state: Mutex::new(MuxState {
                    entries: Vec::new(),
                    hooked: false,
                    next_id: 0,
                }),
            }
        });
        Self { inner }
    }

    /// The merged downstream source.
    pub fn event(&self) -> EventSource<E> {
        self.inner.emitter.event()
    }

    /// Tracks `source`; hooks it right away when downstream listeners exist.
    #[track_caller]
    pub fn add(&self, source: EventSource<E>) -> Subscription {
        let site = Location::caller();
        let (id, hook_now) = {
            let mut state = self.inner.state.lock();
            let id = state.next_id;
            state.next_id += 1;
            state.entries.push(Tracked {
                id,
                source: source.clone(),
                site,
                live: None,
            });
            (id, state.hooked)
        };
        if hook_now {
            let live = source.subscribe_at(Arc::clone(&self.inner.forward), site);
            self.inner.attach(id, live);
        }

        let weak = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.remove(id);
            }
        })
    }

    /// Number of tracked sources.
    pub fn len(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    /// Returns `true` when no source is tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Unhooks and forgets every source and disposes the downstream emitter.
    pub fn dispose(&self) {
        self.inner.emitter.dispose();
        let entries = std::mem::take(&mut self.inner.state.lock().entries);
        for entry in entries {
            if let Some(live) = entry.live {
                live.dispose();
            }
        }
    }

    #[cfg(test)]
    fn hooked_count(&self) -> usize {
        self.inner
            .state
            .lock()
            .entries
            .iter()
            .filter(|e| e.live.is_some())
            .count()
    }
}

impl<E: Clone + Send + Sync + 'static> MuxInner<E> {
    fn hook(&self) {
        let pending: Vec<_> = {
            let mut state = self.state.lock();
            state.hooked = true;
            state
                .entries
                .iter()
                .filter(|e| e.live.is_none())
                .map(|e| (e.id, e.source.clone(), e.site))
                .collect()
        };
        for (id, source, site) in pending {
            let live = source.subscribe_at(Arc::clone(&self.forward), site);
            self.attach(id, live);
        }
    }

    fn unhook(&self) {
        let live: Vec<Subscription> = {
            let mut state = self.state.lock();
            state.hooked = false;
            state
                .entries
                .iter_mut()
                .filter_map(|e| e.live.take())
                .collect()
        };
        for sub in live {
            sub.dispose();
        }
    }

    /// Stores `live` for entry `id`, or releases it if the entry is gone or
    /// the multiplexer was unhooked meanwhile.
    fn attach(&self, id: u64, live: Subscription) {
        let stale = {
            let mut state = self.state.lock();
            let hooked = state.hooked;
            match state.entries.iter_mut().find(|e| e.id == id) {
                Some(entry) if hooked && entry.live.is_none() => {
                    entry.live = Some(live);
                    None
                }
                _ => Some(live),
            }
        };
        if let Some(live) = stale {
            live.dispose();
        }
    }

    fn remove(&self, id: u64) {
        let removed = {
            let mut state = self.state.lock();
            state
                .entries
                .iter()
                .position(|e| e.id == id)
                .map(|pos| state.entries.remove(pos))
        };
        if let Some(live) = removed.and_then(|e| e.live) {
            live.dispose();
        }
    }
}

impl<E: Clone + Send + Sync + 'static> Default for EventMultiplexer<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Clone + Send + Sync + 'static> Disposable for EventMultiplexer<E> {
    fn dispose(&self) {
        EventMultiplexer::dispose(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorded(mux: &EventMultiplexer<u32>) -> (Arc<Mutex<Vec<u32>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let sub = mux.event().subscribe(move |n| s.lock().push(*n));
        (seen, sub)
    }

    #[test]
    fn test_sources_hooked_only_with_downstream_listeners() {
        let a = Emitter::<u32>::new();
        let b = Emitter::<u32>::new();
        let mux = EventMultiplexer::new();
        let _ha = mux.add(a.event());
        let _hb = mux.add(b.event());

        assert!(!a.has_listeners());
        assert!(!b.has_listeners());

        let (seen, sub) = recorded(&mux);
        assert_eq!(mux.hooked_count(), 2);
        a.fire(1);
        b.fire(2);
        assert_eq!(*seen.lock(), vec![1, 2]);

        sub.dispose();
        assert!(!a.has_listeners());
        assert!(!b.has_listeners());
        assert_eq!(mux.len(), 2);
    }

    #[test]
    fn test_add_while_listening_hooks_immediately() {
        let a = Emitter::<u32>::new();
        let mux = EventMultiplexer::new();
        let (seen, _sub) = recorded(&mux);

        let _ha = mux.add(a.event());
        assert!(a.has_listeners());
        a.fire(9);
        assert_eq!(*seen.lock(), vec![9]);
    }

    #[test]
    fn test_releasing_handle_removes_source() {
        let a = Emitter::<u32>::new();
        let b = Emitter::<u32>::new();
        let mux = EventMultiplexer::new();
        let (seen, _sub) = recorded(&mux);
        let ha = mux.add(a.event());
        let _hb = mux.add(b.event());

        ha.dispose();
        a.fire(1);
        b.fire(2);
        assert_eq!(*seen.lock(), vec![2]);
        assert!(!a.has_listeners());
        assert_eq!(mux.len(), 1);
    }

    #[test]
    fn test_dispose_unhooks_everything() {
        let a = Emitter::<u32>::new();
        let mux = EventMultiplexer::new();
        let (seen, _sub) = recorded(&mux);
        let _ha = mux.add(a.event());

        mux.dispose();
        a.fire(1);
        assert!(seen.lock().is_empty());
        assert!(!a.has_listeners());
        assert!(mux.is_empty());
    }
}
