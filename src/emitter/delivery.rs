//! # Delivery queue
//!
//! FIFO of `(listener, payload)` pairs built once per `fire` from a snapshot of
//! the listener set. Entries hold the listener record itself, not a membership
//! check: a listener released after it was queued still runs for that payload.
//!
//! ```text
//! fire(a) with [L1, L2]         queue: (L1,a) (L2,a)
//!   L1 runs, fires b            queue: (L2,a) (L1,b) (L2,b)   (appended, breadth-first)
//!   L2 runs ...
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use super::listener::ListenerRecord;

/// One pending invocation.
pub(crate) struct Delivery<E> {
    pub(crate) listener: Arc<ListenerRecord<E>>,
    pub(crate) payload: Arc<E>,
}

/// Per-dispatch FIFO shared by reentrant fires.
pub(crate) struct DeliveryQueue<E> {
    entries: VecDeque<Delivery<E>>,
}

impl<E> DeliveryQueue<E> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Appends one entry per listener, in listener order, all sharing `payload`.
    pub(crate) fn enqueue(&mut self, listeners: &[Arc<ListenerRecord<E>>], payload: Arc<E>) {
        self.entries.extend(listeners.iter().map(|listener| Delivery {
            listener: Arc::clone(listener),
            payload: Arc::clone(&payload),
        }));
    }

    pub(crate) fn pop(&mut self) -> Option<Delivery<E>> {
        self.entries.pop_front()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::Location;

    fn record() -> Arc<ListenerRecord<&'static str>> {
        Arc::new(ListenerRecord::new(Arc::new(|_: &&str| {}), Location::caller()))
    }

    #[test]
    fn test_enqueue_preserves_listener_then_payload_order() {
        let l1 = record();
        let l2 = record();
        let mut q = DeliveryQueue::with_capacity(2);
        q.enqueue(&[Arc::clone(&l1), Arc::clone(&l2)], Arc::new("a"));
        q.enqueue(&[Arc::clone(&l1)], Arc::new("b"));
        assert_eq!(q.len(), 3);

        let first = q.pop().unwrap();
        assert!(Arc::ptr_eq(&first.listener, &l1));
        assert_eq!(*first.payload, "a");
        let second = q.pop().unwrap();
        assert!(Arc::ptr_eq(&second.listener, &l2));
        let third = q.pop().unwrap();
        assert_eq!(*third.payload, "b");
        assert!(q.pop().is_none());
    }
}
