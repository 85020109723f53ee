//! # Relay
//!
//! One stable source over a swappable input.
//!
//! ```text
//!   input (swappable) ──► relay emitter ──► downstream listeners
//! ```
//!
//! ## Rules
//! - No downstream listener ─► no upstream subscription.
//! - First downstream listener ─► subscribe to the current input.
//! - [`Relay::set_input`] while listening ─► drop the old subscription and
//!   subscribe to the new input immediately.
//! - [`Relay::set_input`] while idle ─► only remember the new input.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::config::EmitterOptions;
use crate::emitter::{Callback, Emitter, EventSource};
use crate::lifecycle::{Disposable, Subscription};

struct RelayState<E> {
    input: EventSource<E>,
    listening: bool,
    live: Option<Subscription>,
}

struct RelayInner<E> {
    emitter: Emitter<E>,
    forward: Arc<Callback<E>>,
    state: Mutex<RelayState<E>>,
}

/// Forwards whichever source is currently set as input.
///
/// # Example
/// ```
/// use fanout::{Emitter, Relay};
///
/// let first = Emitter::<&'static str>::new();
/// let second = Emitter::<&'static str>::new();
///
/// let relay = Relay::new();
/// relay.set_input(first.event());
/// let _sub = relay.event().subscribe(|s| println!("{s}"));
///
/// first.fire("from first");
/// relay.set_input(second.event());
/// first.fire("ignored");
/// second.fire("from second");
/// ```
pub struct Relay<E> {
    inner: Arc<RelayInner<E>>,
}

impl<E: Clone + Send + Sync + 'static> Relay<E> {
    /// Creates a relay whose input never fires.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(EmitterOptions::default())
    }

    /// Creates a relay; `options` configure the downstream emitter.
    ///
    /// Hooks set on `options` are replaced.
    #[must_use]
    pub fn with_options(options: EmitterOptions) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<RelayInner<E>>| {
            let on_first = Weak::clone(weak);
            let on_last = Weak::clone(weak);
            let emitter = Emitter::with_options(
                options
                    .on_will_add_first_listener(move || {
                        if let Some(inner) = on_first.upgrade() {
                            inner.listen();
                        }
                    })
                    .on_did_remove_last_listener(move || {
                        if let Some(inner) = on_last.upgrade() {
                            inner.unlisten();
                        }
                    }),
            );
            let target = emitter.downgrade();
            let forward: Arc<Callback<E>> = Arc::new(move |event: &E| target.fire(event.clone()));
            RelayInner {
                emitter,
                forward,
                state: Mutex::new(RelayState {
                    input: EventSource::none(),
                    listening: false,
                    live: None,
                }),
            }
        });
        Self { inner }
    }

    /// The stable downstream source.
    pub fn event(&self) -> EventSource<E> {
        self.inner.emitter.event()
    }

    /// Replaces the input source.
    #[track_caller]
    pub fn set_input(&self, input: EventSource<E>) {
        let (old, listening) = {
            let mut state = self.inner.state.lock();
            state.input = input.clone();
            (state.live.take(), state.listening)
        };
        if let Some(old) = old {
            old.dispose();
        }
        if listening {
            let live = input.subscribe_at(
                Arc::clone(&self.inner.forward),
                std::panic::Location::caller(),
            );
            self.inner.store(live);
        }
    }

    /// Returns `true` while an upstream subscription is held.
    pub fn is_listening(&self) -> bool {
        self.inner.state.lock().listening
    }

    /// Drops the upstream subscription and disposes the downstream emitter.
    pub fn dispose(&self) {
        self.inner.emitter.dispose();
        self.inner.unlisten();
    }
}

impl<E: Clone + Send + Sync + 'static> RelayInner<E> {
    #[track_caller]
    fn listen(&self) {
        let input = {
            let mut state = self.state.lock();
            state.listening = true;
            state.input.clone()
        };
        let live = input.subscribe_at(Arc::clone(&self.forward), std::panic::Location::caller());
        self.store(live);
    }

    fn unlisten(&self) {
        let live = {
            let mut state = self.state.lock();
            state.listening = false;
            state.live.take()
        };
        if let Some(live) = live {
            live.dispose();
        }
    }

    /// Keeps `live` unless the relay stopped listening or got a newer one meanwhile.
    fn store(&self, live: Subscription) {
        let stale = {
            let mut state = self.state.lock();
            if state.listening && state.live.is_none() {
                state.live = Some(live);
                None
            } else {
                Some(live)
            }
        };
        if let Some(live) = stale {
            live.dispose();
        }
    }
}

impl<E: Clone + Send + Sync + 'static> Default for Relay<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Clone + Send + Sync + 'static> Disposable for Relay<E> {
    fn dispose(&self) {
        Relay::dispose(self);
    }
}
