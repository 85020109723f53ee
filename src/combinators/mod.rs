//! # Combinators
//!
//! Derive new sources from existing ones.
//!
//! Every combinator takes an [`EventSource`](crate::EventSource) and returns a
//! new one (or a [`Subscription`](crate::Subscription) for the listener-style
//! helpers). Input sources are never modified.
//!
//! | Group | Functions |
//! |---|---|
//! | per-emission | [`once`], [`filter`], [`map`], [`signal`], [`reduce`], [`any`], [`latch`] |
//! | timing | [`debounced_listener`], [`debounce`], [`buffer`] |
//! | bridges | [`from_external`], [`to_future`], [`run_and_subscribe`] |
//!
//! ## Leak-prone helpers
//! [`buffer`] subscribes upstream at construction and keeps that
//! subscription until its downstream side has gained and lost a listener.
//! [`to_future`] holds its subscription until the first emission, until the
//! future is dropped, or until the source is torn down. Prefer plain
//! subscriptions stored in a [`DisposableStore`](crate::DisposableStore).

mod basic;
mod bridge;
mod timing;

pub use basic::{any, filter, latch, map, once, reduce, signal};
pub use bridge::{ExternalNotifier, from_external, run_and_subscribe, to_future};
pub use timing::{ReduceFn, buffer, debounce, debounced_listener};
