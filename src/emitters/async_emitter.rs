//! # AsyncEmitter
//!
//! Sequential fan-out with per-listener joins.
//!
//! [`AsyncEmitter::fire_async`] visits listeners **one at a time**. Each
//! listener receives an [`AsyncEvent`] and may contribute futures through
//! [`AsyncEvent::wait_until`] while its synchronous call is running. The
//! emitter then awaits all of that listener's futures before moving on.
//!
//! ## Turn protocol
//! ```text
//! for listener in snapshot:
//!     token cancelled? ──► stop
//!     listener(&event)            // wait_until(..) accepted here only
//!     freeze joins                // later wait_until ─► LateJoinError
//!     await all joins (all-settle)
//!         ├─ Err   ─► ErrorSink (JoinFailed)
//!         └─ panic ─► ErrorSink (JoinPanicked)
//! ```
//!
//! ## Rules
//! - Latency adds up: total time is the **sum** of each listener's join time.
//! - Cancellation is checked only between turns; a running join is never interrupted.
//! - A listener that panics is reported and its joins are discarded.
//! - Nothing is returned to the caller; every failure goes to the error sink.

use std::collections::VecDeque;
use std::future::Future;
use std::ops::Deref;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::EmitterOptions;
use crate::emitter::{Emitter, EventSource};
use crate::error::{BoxError, DispatchError, LateJoinError, panic_message};
use crate::lifecycle::{Disposable, Subscription};

/// Future contributed through [`AsyncEvent::wait_until`].
pub type JoinFuture = BoxFuture<'static, Result<(), BoxError>>;

/// Rewrites each joined future as it is registered.
pub type JoinTransform = dyn Fn(JoinFuture) -> JoinFuture + Send + Sync;

/// Futures collected during one listener turn.
struct Joins {
    /// `None` once the turn is frozen.
    open: Mutex<Option<Vec<JoinFuture>>>,
    transform: Option<Arc<JoinTransform>>,
}

impl Joins {
    fn open(transform: Option<Arc<JoinTransform>>) -> Self {
        Self {
            open: Mutex::new(Some(Vec::new())),
            transform,
        }
    }

    /// Closes the turn and hands out everything collected.
    fn freeze(&self) -> Vec<JoinFuture> {
        self.open.lock().take().unwrap_or_default()
    }
}

/// Payload seen by [`AsyncEmitter`] listeners.
///
/// Dereferences to the fired data.
pub struct AsyncEvent<E> {
    data: E,
    token: CancellationToken,
    joins: Arc<Joins>,
}

impl<E: Clone> Clone for AsyncEvent<E> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            token: self.token.clone(),
            joins: Arc::clone(&self.joins),
        }
    }
}

impl<E> AsyncEvent<E> {
    /// The fired data.
    pub fn data(&self) -> &E {
        &self.data
    }

    /// Token passed to `fire_async`.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Makes the emitter wait for `fut` before visiting the next listener.
    ///
    /// # Errors
    ///
    /// Returns [`LateJoinError`] once the listener's synchronous call has
    /// returned (e.g. when called from a spawned task).
    pub fn wait_until<F>(&self, fut: F) -> Result<(), LateJoinError>
    where
        F: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let mut open = self.joins.open.lock();
        let Some(pending) = open.as_mut() else {
            return Err(LateJoinError);
        };
        let fut: JoinFuture = Box::pin(fut);
        pending.push(match &self.joins.transform {
            Some(transform) => transform(fut),
            None => fut,
        });
        Ok(())
    }
}

impl<E> Deref for AsyncEvent<E> {
    type Target = E;

    fn deref(&self) -> &E {
        &self.data
    }
}

/// Emitter whose fire visits listeners sequentially and awaits their joins.
pub struct AsyncEmitter<E> {
    emitter: Emitter<AsyncEvent<E>>,
}

impl<E: Clone + Send + Sync + 'static> AsyncEmitter<E> {
    /// Creates an emitter with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(EmitterOptions::default())
    }

    /// Creates an emitter with the given options.
    #[must_use]
    pub fn with_options(options: EmitterOptions) -> Self {
        Self {
            emitter: Emitter::with_options(options),
        }
    }

    /// The public subscribe capability.
    pub fn event(&self) -> EventSource<AsyncEvent<E>> {
        self.emitter.event()
    }

    /// Shorthand for `self.event().subscribe(callback)`.
    #[track_caller]
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&AsyncEvent<E>) + Send + Sync + 'static,
    {
        self.emitter.subscribe(callback)
    }

    /// Returns `true` if at least one listener is attached.
    pub fn has_listeners(&self) -> bool {
        self.emitter.has_listeners()
    }

    /// Number of live listeners.
    pub fn listener_count(&self) -> usize {
        self.emitter.listener_count()
    }

    /// Visits listeners one by one, awaiting each listener's joins.
    ///
    /// Completes immediately when nobody listens. Stops early once `token`
    /// is cancelled (checked before each listener).
    pub async fn fire_async(&self, data: E, token: &CancellationToken) {
        self.run(data, token, None).await;
    }

    /// Like [`fire_async`](Self::fire_async), rewriting every joined future
    /// with `transform` as it is registered.
    pub async fn fire_async_with<T>(&self, data: E, token: &CancellationToken, transform: T)
    where
        T: Fn(JoinFuture) -> JoinFuture + Send + Sync + 'static,
    {
        self.run(data, token, Some(Arc::new(transform))).await;
    }

    /// Detaches all listeners; later fires complete immediately.
    pub fn dispose(&self) {
        self.emitter.dispose();
    }

    async fn run(
        &self,
        data: E,
        token: &CancellationToken,
        transform: Option<Arc<JoinTransform>>,
    ) {
        let mut queue: VecDeque<_> = self.emitter.snapshot().into();

        while let Some(listener) = queue.pop_front() {
            if token.is_cancelled() {
                break;
            }

            let joins = Arc::new(Joins::open(transform.clone()));
            let event = AsyncEvent {
                data: data.clone(),
                token: token.clone(),
                joins: Arc::clone(&joins),
            };
            let completed = self.emitter.deliver(&listener, &event);
            let pending = joins.freeze();
            if !completed || pending.is_empty() {
                continue;
            }

            let settled = join_all(
                pending
                    .into_iter()
                    .map(|fut| AssertUnwindSafe(fut).catch_unwind()),
            )
            .await;
            for outcome in settled {
                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(error)) => self.emitter.report(DispatchError::JoinFailed {
                        emitter: self.emitter.debug_name(),
                        error,
                    }),
                    Err(panic_err) => self.emitter.report(DispatchError::JoinPanicked {
                        emitter: self.emitter.debug_name(),
                        info: panic_message(panic_err.as_ref()),
                    }),
                }
            }
        }
    }
}

impl<E: Clone + Send + Sync + 'static> Default for AsyncEmitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Clone + Send + Sync + 'static> Disposable for AsyncEmitter<E> {
    fn dispose(&self) {
        AsyncEmitter::dispose(self);
    }
}
