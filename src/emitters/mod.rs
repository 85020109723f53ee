//! Emitter flavours composed over [`Emitter`](crate::Emitter).
//!
//! - [`AsyncEmitter`] awaits each listener's joined futures in turn.
//! - [`PauseableEmitter`] holds payloads back while paused.
//! - [`DebounceEmitter`] merges bursts into one trailing emission.
//! - [`MicrotaskEmitter`] batches everything fired within one scheduler turn.

mod async_emitter;
mod debounce;
mod microtask;
mod pauseable;

pub use async_emitter::{AsyncEmitter, AsyncEvent, JoinFuture, JoinTransform};
pub use debounce::DebounceEmitter;
pub use microtask::MicrotaskEmitter;
pub use pauseable::{MergeFn, PauseableEmitter};
