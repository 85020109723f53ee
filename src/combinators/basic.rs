//! Per-emission transforms: `once`, `filter`, `map`, `signal`, `reduce`, `any`, `latch`.
//!
//! Every function returns a new [`EventSource`] and leaves its input untouched.
//! Nothing is subscribed upstream until the returned source is subscribed, and
//! each downstream subscription gets its own upstream subscription.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::emitter::{Callback, EventSource};
use crate::lifecycle::Subscription;

/// Delivers only the first emission, then unsubscribes.
///
/// Safe when the source fires again from inside the listener: the listener
/// still runs once.
pub fn once<E: 'static>(source: EventSource<E>) -> EventSource<E> {
    EventSource::new(move |callback: Arc<Callback<E>>, site| {
        let fired = Arc::new(AtomicBool::new(false));
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let (f, s) = (Arc::clone(&fired), Arc::clone(&slot));
        let sub = source.subscribe_at(
            Arc::new(move |event: &E| {
                if f.swap(true, Ordering::SeqCst) {
                    return;
                }
                if let Some(sub) = s.lock().take() {
                    sub.dispose();
                }
                callback(event);
            }),
            site,
        );

        *slot.lock() = Some(sub.clone());
        if fired.load(Ordering::SeqCst) {
            if let Some(sub) = slot.lock().take() {
                sub.dispose();
            }
        }
        sub
    })
}

/// Forwards emissions for which `predicate` returns `true`.
pub fn filter<E, P>(source: EventSource<E>, predicate: P) -> EventSource<E>
where
    E: 'static,
    P: Fn(&E) -> bool + Send + Sync + 'static,
{
    let predicate = Arc::new(predicate);
    EventSource::new(move |callback: Arc<Callback<E>>, site| {
        let predicate = Arc::clone(&predicate);
        source.subscribe_at(
            Arc::new(move |event: &E| {
                if predicate(event) {
                    callback(event);
                }
            }),
            site,
        )
    })
}

/// Transforms every emission with `f`.
pub fn map<I, O, F>(source: EventSource<I>, f: F) -> EventSource<O>
where
    I: 'static,
    O: 'static,
    F: Fn(&I) -> O + Send + Sync + 'static,
{
    let f = Arc::new(f);
    EventSource::new(move |callback: Arc<Callback<O>>, site| {
        let f = Arc::clone(&f);
        source.subscribe_at(Arc::new(move |event: &I| callback(&f(event))), site)
    })
}

/// Drops the payload; listeners only learn that something happened.
pub fn signal<E: 'static>(source: EventSource<E>) -> EventSource<()> {
    map(source, |_| ())
}

/// Folds emissions into an accumulator and forwards each new value.
///
/// The accumulator lives in the returned source and is shared by all of its
/// subscribers, so two listeners each advance the same running value.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use parking_lot::Mutex;
/// use fanout::{Emitter, combinators};
///
/// let emitter = Emitter::<u32>::new();
/// let totals = combinators::reduce(
///     emitter.event(),
///     |acc: Option<u32>, n| acc.unwrap_or(0) + n,
///     None,
/// );
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let s = Arc::clone(&seen);
/// let _sub = totals.subscribe(move |t| s.lock().push(*t));
/// emitter.fire(1);
/// emitter.fire(2);
/// assert_eq!(*seen.lock(), vec![1, 3]);
/// ```
pub fn reduce<I, O, M>(source: EventSource<I>, merge: M, initial: Option<O>) -> EventSource<O>
where
    I: 'static,
    O: Clone + Send + 'static,
    M: Fn(Option<O>, &I) -> O + Send + Sync + 'static,
{
    let merge = Arc::new(merge);
    let acc = Arc::new(Mutex::new(initial));
    EventSource::new(move |callback: Arc<Callback<O>>, site| {
        let (merge, acc) = (Arc::clone(&merge), Arc::clone(&acc));
        source.subscribe_at(
            Arc::new(move |event: &I| {
                let previous = acc.lock().take();
                let next = merge(previous, event);
                *acc.lock() = Some(next.clone());
                callback(&next);
            }),
            site,
        )
    })
}

/// Fan-in over a fixed set of sources.
///
/// Unlike [`EventMultiplexer`](crate::EventMultiplexer) the set cannot change
/// after construction.
pub fn any<E: 'static>(sources: Vec<EventSource<E>>) -> EventSource<E> {
    EventSource::new(move |callback: Arc<Callback<E>>, site| {
        Subscription::combine(
            sources
                .iter()
                .map(|source| source.subscribe_at(Arc::clone(&callback), site)),
        )
    })
}

/// Suppresses an emission when `equals` says it matches the previous one.
///
/// The first emission always passes. Each subscriber keeps its own "previous".
pub fn latch<E, Q>(source: EventSource<E>, equals: Q) -> EventSource<E>
where
    E: Clone + Send + 'static,
    Q: Fn(&E, &E) -> bool + Send + Sync + 'static,
{
    let equals = Arc::new(equals);
    EventSource::new(move |callback: Arc<Callback<E>>, site| {
        let equals = Arc::clone(&equals);
        let last: Mutex<Option<E>> = Mutex::new(None);
        source.subscribe_at(
            Arc::new(move |event: &E| {
                let repeat = {
                    let mut last = last.lock();
                    let repeat = last.as_ref().is_some_and(|prev| equals(prev, event));
                    *last = Some(event.clone());
                    repeat
                };
                if !repeat {
                    callback(event);
                }
            }),
            site,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Emitter;

    fn collect<E: Clone + Send + 'static>(
        source: &EventSource<E>,
    ) -> (Arc<Mutex<Vec<E>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let sub = source.subscribe(move |e: &E| s.lock().push(e.clone()));
        (seen, sub)
    }

    #[test]
    fn test_once_delivers_first_and_detaches() {
        let emitter = Emitter::<u32>::new();
        let (seen, sub) = collect(&once(emitter.event()));
        emitter.fire(1);
        emitter.fire(2);
        assert_eq!(*seen.lock(), vec![1]);
        assert!(sub.is_disposed());
        assert!(!emitter.has_listeners());
    }

    #[test]
    fn test_once_survives_reentrant_fire() {
        let emitter = Emitter::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (e, s) = (emitter.clone(), Arc::clone(&seen));
        let _sub = once(emitter.event()).subscribe(move |n| {
            s.lock().push(*n);
            e.fire(n + 1);
        });
        emitter.fire(1);
        assert_eq!(*seen.lock(), vec![1]);
    }

    #[test]
    fn test_once_callback_freed_with_emitter() {
        let emitter = Emitter::<u32>::new();
        let held = Arc::new(());
        let watch = Arc::downgrade(&held);
        let sub = once(emitter.event()).subscribe(move |_| {
            let _ = &held;
        });

        drop(sub);
        drop(emitter);
        assert!(watch.upgrade().is_none());
    }

    #[test]
    fn test_filter_map_signal() {
        let emitter = Emitter::<u32>::new();
        let evens = filter(emitter.event(), |n| n % 2 == 0);
        let labels = map(evens.clone(), |n| format!("#{n}"));
        let (seen, _a) = collect(&labels);
        let (pings, _b) = collect(&signal(evens));

        for n in 1..=4 {
            emitter.fire(n);
        }
        assert_eq!(*seen.lock(), vec!["#2".to_string(), "#4".to_string()]);
        assert_eq!(pings.lock().len(), 2);
    }

    #[test]
    fn test_reduce_starts_from_initial() {
        let emitter = Emitter::<u32>::new();
        let sums = reduce(emitter.event(), |acc: Option<u32>, n| acc.unwrap_or(0) + n, Some(10));
        let (seen, _sub) = collect(&sums);
        emitter.fire(1);
        emitter.fire(2);
        assert_eq!(*seen.lock(), vec![11, 13]);
    }

    #[test]
    fn test_any_merges_fixed_sources() {
        let a = Emitter::<u32>::new();
        let b = Emitter::<u32>::new();
        let (seen, sub) = collect(&any(vec![a.event(), b.event()]));
        a.fire(1);
        b.fire(2);
        sub.dispose();
        a.fire(3);
        assert_eq!(*seen.lock(), vec![1, 2]);
        assert!(!a.has_listeners() && !b.has_listeners());
    }

    #[test]
    fn test_latch_drops_repeats() {
        let emitter = Emitter::<u32>::new();
        let (seen, _sub) = collect(&latch(emitter.event(), |a, b| a == b));
        for n in [1, 1, 2, 2, 1] {
            emitter.fire(n);
        }
        assert_eq!(*seen.lock(), vec![1, 2, 1]);
    }

    #[test]
    fn test_subscription_site_reaches_upstream() {
        let emitter = Emitter::<u32>::new();
        let seen = Arc::new(Mutex::new(None));
        let s = Arc::clone(&seen);
        let probe = EventSource::<u32>::new(move |cb, site| {
            *s.lock() = Some(site.file());
            emitter.event().subscribe_at(cb, site)
        });
        let _sub = map(filter(probe, |_| true), |n| *n).subscribe(|_| {});
        assert_eq!(*seen.lock(), Some(file!()));
    }
}
