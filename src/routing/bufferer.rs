//! # EventBufferer
//!
//! Hold emissions until a critical section ends.
//!
//! Sources wrapped with [`EventBufferer::wrap_event`] deliver immediately,
//! unless a section opened by [`EventBufferer::buffer_events`] is running. In
//! that case each emission is parked in the innermost open section and
//! replayed, in arrival order, after the section's closure has returned.
//!
//! ```text
//! buffer_events(|| {          stack: [[]]
//!     a.fire(1)   ──► park    stack: [[a(1)]]
//!     buffer_events(|| {      stack: [[a(1)], []]
//!         b.fire(2) ─► park   stack: [[a(1)], [b(2)]]
//!     })          ──► replay b(2)
//!     a.fire(3)   ──► park    stack: [[a(1), a(3)]]
//! })              ──► replay a(1), a(3)
//! ```
//!
//! Replayed deliveries are isolated like a regular fire: a panicking listener
//! is reported to the bufferer's [`ErrorSink`] and the rest of the batch still
//! runs.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::emitter::{Callback, EventSource};
use crate::error::{DispatchError, ErrorSink, panic_message, report};

type Parked = Box<dyn FnOnce() + Send>;

/// Defers emissions of wrapped sources while a critical section runs.
#[derive(Clone, Default)]
pub struct EventBufferer {
    stack: Arc<Mutex<Vec<Vec<Parked>>>>,
    sink: Option<Arc<dyn ErrorSink>>,
}

/// Pops the section it opened, also on unwind.
struct SectionGuard<'a> {
    stack: &'a Mutex<Vec<Vec<Parked>>>,
    open: bool,
}

impl SectionGuard<'_> {
    fn close(mut self) -> Vec<Parked> {
        self.open = false;
        self.stack.lock().pop().unwrap_or_default()
    }
}

impl Drop for SectionGuard<'_> {
    fn drop(&mut self) {
        if self.open {
            self.stack.lock().pop();
        }
    }
}

impl EventBufferer {
    /// Creates a bufferer with no open section.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports replay panics to `sink` instead of the process-wide sink.
    #[inline]
    pub fn with_error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Returns `true` while a section is open.
    pub fn is_buffering(&self) -> bool {
        !self.stack.lock().is_empty()
    }

    /// Wraps `source` so that its emissions honour open sections.
    pub fn wrap_event<E>(&self, source: EventSource<E>) -> EventSource<E>
    where
        E: Clone + Send + Sync + 'static,
    {
        let stack = Arc::clone(&self.stack);
        EventSource::new(move |callback: Arc<Callback<E>>, site| {
            let stack = Arc::clone(&stack);
            let parking = move |event: &E| {
                let mut sections = stack.lock();
                match sections.last_mut() {
                    Some(open) => {
                        let callback = Arc::clone(&callback);
                        let event = event.clone();
                        open.push(Box::new(move || callback(&event)));
                    }
                    None => {
                        drop(sections);
                        callback(event);
                    }
                }
            };
            source.subscribe_at(Arc::new(parking), site)
        })
    }

    /// Runs `section`, then replays everything wrapped sources emitted during it.
    ///
    /// Sections nest; an inner section replays when it closes, before the
    /// outer one continues. A panic inside `section` discards its parked
    /// emissions; a panic inside a replayed listener is reported and the
    /// remaining emissions are still delivered.
    pub fn buffer_events<R>(&self, section: impl FnOnce() -> R) -> R {
        self.stack.lock().push(Vec::new());
        let guard = SectionGuard {
            stack: &self.stack,
            open: true,
        };
        let result = section();
        let parked = guard.close();
        for replay in parked {
            self.replay(replay);
        }
        result
    }

    fn replay(&self, parked: Parked) {
        if let Err(panic_err) = panic::catch_unwind(AssertUnwindSafe(parked)) {
            report(
                self.sink.as_ref(),
                DispatchError::ListenerPanicked {
                    emitter: None,
                    info: panic_message(panic_err.as_ref()),
                },
            );
        }
    }
}

impl std::fmt::Debug for EventBufferer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBufferer")
            .field("open_sections", &self.stack.lock().len())
            .field("sink", &self.sink.as_ref().map(|s| s.name()))
            .finish()
    }
}
