//! Scoped-resource protocol: release handles and batch-release pools.
//!
//! ## Contents
//! - [`Disposable`] anything with an idempotent `dispose`
//! - [`Subscription`] release handle returned by `subscribe`
//! - [`DisposableStore`] pool that releases everything it holds at once
//!
//! ```text
//! source.subscribe(f) ──► Subscription ──┬─► dispose()           (held individually)
//!                                        └─► store.add(..)       (released with the store)
//! ```

mod store;
mod subscription;

pub use store::DisposableStore;
pub use subscription::Subscription;
pub(crate) use subscription::SubscriptionCell;

/// Idempotent release.
///
/// Calling `dispose` more than once must have the same effect as calling it once.
pub trait Disposable: Send + Sync {
    /// Releases the resource.
    fn dispose(&self);
}
