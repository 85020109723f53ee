//! # DisposableStore
//!
//! Batch-release pool.
//!
//! Collects [`Disposable`]s and releases them together, in insertion order,
//! on [`DisposableStore::dispose`] or when the store is dropped.
//!
//! ## Rules
//! - `dispose` is idempotent.
//! - Adding to an already disposed store disposes the item immediately (warn).

use parking_lot::Mutex;

use super::Disposable;

#[derive(Default)]
struct StoreState {
    disposed: bool,
    items: Vec<Box<dyn Disposable>>,
}

/// Pool of disposables released as one.
#[derive(Default)]
pub struct DisposableStore {
    state: Mutex<StoreState>,
}

impl DisposableStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of `item`, releasing it together with the store.
    pub fn add<D: Disposable + 'static>(&self, item: D) {
        let mut state = self.state.lock();
        if state.disposed {
            drop(state);
            tracing::warn!(
                "adding a disposable to a store that has already been disposed; it is released immediately"
            );
            item.dispose();
            return;
        }
        state.items.push(Box::new(item));
    }

    /// Number of held items.
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Returns `true` if the store holds nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` after the first `dispose`.
    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    /// Releases every held item without marking the store disposed.
    pub fn clear(&self) {
        let items = std::mem::take(&mut self.state.lock().items);
        for item in items {
            item.dispose();
        }
    }

    /// Releases every held item and rejects future additions.
    pub fn dispose(&self) {
        let items = {
            let mut state = self.state.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            std::mem::take(&mut state.items)
        };
        for item in items {
            item.dispose();
        }
    }
}

impl Disposable for DisposableStore {
    fn dispose(&self) {
        DisposableStore::dispose(self);
    }
}

impl Drop for DisposableStore {
    fn drop(&mut self) {
        DisposableStore::dispose(self);
    }
}
