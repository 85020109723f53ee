//! # Listener record
//!
//! One registered callback plus its diagnostics and a weak link to its
//! release handle. Owned by the emitter's listener set until released; the
//! delivery queue holds extra strong references for in-flight payloads.

use std::panic::Location;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::emitter::source::Callback;
use crate::lifecycle::SubscriptionCell;

/// A single subscriber of an [`Emitter`](crate::Emitter).
pub(crate) struct ListenerRecord<E> {
    /// The user callback.
    pub(crate) callback: Arc<Callback<E>>,
    /// Where `subscribe` was called from.
    pub(crate) site: &'static Location<'static>,
    /// Set when the leak monitor tallied this listener.
    tallied: AtomicBool,
    /// Release handle, unset on emitter disposal.
    handle: Mutex<Weak<SubscriptionCell>>,
}

impl<E> ListenerRecord<E> {
    pub(crate) fn new(callback: Arc<Callback<E>>, site: &'static Location<'static>) -> Self {
        Self {
            callback,
            site,
            tallied: AtomicBool::new(false),
            handle: Mutex::new(Weak::new()),
        }
    }

    pub(crate) fn bind_handle(&self, handle: Weak<SubscriptionCell>) {
        *self.handle.lock() = handle;
    }

    pub(crate) fn mark_tallied(&self) {
        self.tallied.store(true, Ordering::Relaxed);
    }

    /// Clears the tally flag, returning whether it was set.
    pub(crate) fn take_tallied(&self) -> bool {
        self.tallied.swap(false, Ordering::Relaxed)
    }

    /// Marks the release handle spent without running it.
    pub(crate) fn unset_handle(&self) {
        let handle = std::mem::take(&mut *self.handle.lock());
        if let Some(cell) = handle.upgrade() {
            cell.unset();
        }
    }
}
