//! Core emitter: event sources, listener records, dispatch, diagnostics.
//!
//! ## Contents
//! - [`EventSource`] subscribe capability (cloneable, combinable)
//! - [`Emitter`] / [`WeakEmitter`] fire capability and listener set owner
//! - `listener` one registered callback and its diagnostics
//! - `delivery` per-dispatch FIFO snapshot
//! - `leak` call-site tally and rate-limited leak warnings
//! - `profiler` per-fire timing
//!
//! ```text
//!   producer ──► Emitter::fire ──► DeliveryQueue ──► listener callbacks
//!                   │                                   (panic ─► ErrorSink)
//!   consumer ──► EventSource::subscribe ──► ListenerRecord ──► LeakageMonitor
//! ```

mod delivery;
mod dispatch;
mod leak;
mod listener;
mod profiler;
mod source;

pub use dispatch::{Emitter, WeakEmitter};
pub use source::{Callback, EventSource};
