//! # Release handles
//!
//! A [`Subscription`] wraps a release action that runs **at most once**.
//! Clones share the same action, so releasing any clone releases all of them.
//!
//! Dropping a subscription does **not** release it. Hold it, put it into a
//! [`DisposableStore`](crate::DisposableStore), or dispose it explicitly.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::Disposable;

type ReleaseFn = Box<dyn FnOnce() + Send>;

struct Slot {
    spent: bool,
    release: Option<ReleaseFn>,
}

/// Shared cell holding the pending release action.
pub(crate) struct SubscriptionCell {
    slot: Mutex<Slot>,
}

impl SubscriptionCell {
    fn with(release: Option<ReleaseFn>) -> Arc<Self> {
        Arc::new(Self {
            slot: Mutex::new(Slot {
                spent: release.is_none(),
                release,
            }),
        })
    }

    /// Marks the cell spent and drops the action without running it.
    /// Used by emitter disposal.
    pub(crate) fn unset(&self) {
        let action = {
            let mut slot = self.slot.lock();
            slot.spent = true;
            slot.release.take()
        };
        drop(action);
    }
}

/// Idempotent release handle returned by every `subscribe`.
#[derive(Clone)]
#[must_use = "a dropped subscription stays attached; dispose it or add it to a store"]
pub struct Subscription {
    cell: Arc<SubscriptionCell>,
}

impl Subscription {
    /// Wraps `release` in a handle.
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cell: SubscriptionCell::with(Some(Box::new(release))),
        }
    }

    /// A handle that is already spent.
    pub fn empty() -> Self {
        Self {
            cell: SubscriptionCell::with(None),
        }
    }

    /// Combines several handles into one that releases all of them in order.
    pub fn combine(parts: impl IntoIterator<Item = Subscription>) -> Self {
        let parts: Vec<Subscription> = parts.into_iter().collect();
        Self::new(move || {
            for part in parts {
                part.dispose();
            }
        })
    }

    /// Runs the release action if it has not run yet.
    pub fn dispose(&self) {
        let action = {
            let mut slot = self.cell.slot.lock();
            if slot.spent {
                return;
            }
            slot.spent = true;
            slot.release.take()
        };
        if let Some(action) = action {
            action();
        }
    }

    /// Returns `true` once the handle was released or unset by its owner.
    pub fn is_disposed(&self) -> bool {
        self.cell.slot.lock().spent
    }

    pub(crate) fn downgrade(&self) -> Weak<SubscriptionCell> {
        Arc::downgrade(&self.cell)
    }
}

impl Disposable for Subscription {
    fn dispose(&self) {
        Subscription::dispose(self);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting() -> (Arc<AtomicUsize>, Subscription) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let sub = Subscription::new(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        (hits, sub)
    }

    #[test]
    fn test_dispose_is_idempotent_across_clones() {
        let (hits, sub) = counting();
        let other = sub.clone();
        sub.dispose();
        other.dispose();
        sub.dispose();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(other.is_disposed());
    }

    #[test]
    fn test_drop_does_not_release() {
        let (hits, sub) = counting();
        drop(sub);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_combine_releases_every_part() {
        let (a, sa) = counting();
        let (b, sb) = counting();
        let all = Subscription::combine([sa.clone(), sb]);
        sa.dispose();
        all.dispose();
        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unset_skips_action() {
        let (hits, sub) = counting();
        let weak = sub.downgrade();
        weak.upgrade().unwrap().unset();
        assert!(sub.is_disposed());
        sub.dispose();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_empty_is_spent() {
        assert!(Subscription::empty().is_disposed());
    }
}
