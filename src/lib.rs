//! # fanout
//!
//! **fanout** is an in-process publish/subscribe library for Rust.
//!
//! It provides a typed [`Emitter`] with ordered, panic-isolated delivery, a
//! few emitter flavours built on top of it, routing primitives, and a small
//! combinator library for deriving new event sources from existing ones.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   producer                                         consumers
//!  ┌──────────┐      ┌───────────────────────────┐
//!  │  fire(e) │ ───► │  Emitter<E>               │     ┌──────────────┐
//!  └──────────┘      │  - ordered listener set   │ ──► │ listener #1  │
//!                    │  - delivery queue (FIFO)  │ ──► │ listener #2  │
//!                    │  - leak monitor           │ ──► │ listener #3  │
//!                    │  - profiler               │     └──────────────┘
//!                    └─────────────┬─────────────┘
//!                                  │ event()
//!                                  ▼
//!                    ┌───────────────────────────┐
//!                    │  EventSource<E>           │  subscribe ─► Subscription
//!                    └─────────────┬─────────────┘
//!                                  │
//!        ┌────────────────┬────────┴───────┬──────────────────┐
//!        ▼                ▼                ▼                  ▼
//!   combinators      EventMultiplexer    Relay          EventBufferer
//!  (map, filter,     (dynamic fan-in)  (swappable     (critical-section
//!   debounce, ...)                      input)          buffering)
//! ```
//!
//! ### Dispatch
//! ```text
//! fire(e)
//!   ├─► no listeners / disposed ─► return
//!   ├─► drain running?          ─► append snapshot to queue, return
//!   └─► snapshot listeners into queue
//!         loop {
//!           pop (listener, payload)
//!           catch_unwind(listener(&payload))
//!             └─ panic ─► ErrorSink (emitter sink ─► global sink ─► LogSink)
//!         }
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / functions                               |
//! |-------------------|---------------------------------------------------------------|-----------------------------------------------------|
//! | **Core**          | Ordered, breadth-first, panic-isolated fan-out.               | [`Emitter`], [`EventSource`], [`WeakEmitter`]       |
//! | **Lifecycle**     | Idempotent release handles and batch release.                 | [`Subscription`], [`DisposableStore`], [`Disposable`] |
//! | **Flavours**      | Async joins, pause/resume, debounce, end-of-turn batching.    | [`AsyncEmitter`], [`PauseableEmitter`], [`DebounceEmitter`], [`MicrotaskEmitter`] |
//! | **Routing**       | Fan-in, swappable input, critical-section buffering.          | [`EventMultiplexer`], [`Relay`], [`EventBufferer`]  |
//! | **Combinators**   | Derive new sources.                                           | [`combinators`]                                     |
//! | **Errors**        | Reported, never thrown to the firing caller.                  | [`DispatchError`], [`ErrorSink`], [`LateJoinError`] |
//! | **Configuration** | Hooks, leak diagnostics, profiling.                           | [`EmitterOptions`], [`set_global_leak_warning_threshold`] |
//!
//! ## Runtime
//! Synchronous emitters work without any runtime. Deferred work (disposal
//! cleanup, microtask batches, timers) uses Tokio when a runtime is present;
//! [`DebounceEmitter`] and the timing combinators require one.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use parking_lot::Mutex;
//! use fanout::{DisposableStore, Emitter, EmitterOptions, combinators};
//!
//! let clicks = Emitter::<(i32, i32)>::with_options(
//!     EmitterOptions::new().with_debug_name("clicks"),
//! );
//! let store = DisposableStore::new();
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let s = Arc::clone(&seen);
//! let right_half = combinators::filter(clicks.event(), |(x, _)| *x > 100);
//! let sums = combinators::map(right_half, |(x, y)| x + y);
//! let _sums = sums.subscribe_into(move |sum| s.lock().push(*sum), &store);
//!
//! clicks.fire((10, 10));
//! clicks.fire((150, 5));
//! store.dispose();
//! clicks.fire((200, 0));
//!
//! assert_eq!(*seen.lock(), vec![155]);
//! ```

pub mod combinators;
mod config;
mod emitter;
mod emitters;
mod error;
mod lifecycle;
mod routing;
mod scheduler;

// ---- Public re-exports ----

pub use config::{
    EmitterOptions, Hook, LeakThresholdGuard, global_leak_warning_threshold,
    set_global_leak_warning_threshold,
};
pub use emitter::{Callback, Emitter, EventSource, WeakEmitter};
pub use emitters::{
    AsyncEmitter, AsyncEvent, DebounceEmitter, JoinFuture, JoinTransform, MergeFn,
    MicrotaskEmitter, PauseableEmitter,
};
pub use error::{
    BoxError, DispatchError, ErrorSink, ErrorSinkGuard, LateJoinError, LogSink, set_error_sink,
};
pub use lifecycle::{Disposable, DisposableStore, Subscription};
pub use routing::{EventBufferer, EventMultiplexer, Relay};
