//! Bridges between event sources and the outside world.
//!
//! - [`from_external`]: adapts any register/unregister style notifier.
//! - [`to_future`]: resolves with the first emission.
//! - [`run_and_subscribe`]: invokes the handler once up front, then on every emission.

use std::future::Future;
use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::basic::once;
use crate::config::EmitterOptions;
use crate::emitter::{Callback, Emitter, EventSource, WeakEmitter};
use crate::lifecycle::Subscription;

/// A foreign push source exposing a named register/unregister pair.
///
/// `off` receives the same handler `on` was given, so implementations can
/// match by pointer (`Arc::ptr_eq`).
pub trait ExternalNotifier: Send + Sync + 'static {
    /// Payload delivered to handlers.
    type Event;

    /// Registers `handler` for `name`.
    fn on(&self, name: &str, handler: Arc<Callback<Self::Event>>);

    /// Unregisters a handler previously passed to [`on`](Self::on).
    fn off(&self, name: &str, handler: &Arc<Callback<Self::Event>>);

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Exposes the `name` channel of `notifier` as an [`EventSource`].
///
/// The notifier sees exactly one `on` when the source gains its first
/// listener and one `off` when it loses its last one.
pub fn from_external<N>(notifier: Arc<N>, name: impl Into<Arc<str>>) -> EventSource<N::Event>
where
    N: ExternalNotifier,
    N::Event: Clone + Send + Sync + 'static,
{
    let name: Arc<str> = name.into();
    let emitter = Emitter::new_cyclic(|weak: &WeakEmitter<N::Event>| {
        let target = weak.clone();
        let handler: Arc<Callback<N::Event>> =
            Arc::new(move |event: &N::Event| target.fire(event.clone()));
        let registered = Arc::new(AtomicBool::new(false));

        let (on_notifier, off_notifier) = (Arc::clone(&notifier), notifier);
        let (on_name, off_name) = (Arc::clone(&name), name);
        let (on_handler, off_handler) = (Arc::clone(&handler), handler);
        let (on_flag, off_flag) = (Arc::clone(&registered), registered);

        EmitterOptions::new()
            .on_will_add_first_listener(move || {
                if !on_flag.swap(true, Ordering::SeqCst) {
                    tracing::debug!(
                        notifier = on_notifier.name(),
                        channel = %on_name,
                        "registering external handler"
                    );
                    on_notifier.on(&on_name, Arc::clone(&on_handler));
                }
            })
            .on_did_remove_last_listener(move || {
                if off_flag.swap(false, Ordering::SeqCst) {
                    tracing::debug!(
                        notifier = off_notifier.name(),
                        channel = %off_name,
                        "unregistering external handler"
                    );
                    off_notifier.off(&off_name, &off_handler);
                }
            })
    });
    emitter.event()
}

/// Resolves with the first emission of `source`.
///
/// Subscribes immediately, not on first poll. Resolves with `None` when the
/// source is torn down (its emitter disposed or dropped) before emitting. Dropping the
/// future releases the subscription.
///
/// # Example
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use fanout::{Emitter, combinators};
///
/// let emitter = Emitter::<u32>::new();
/// let first = combinators::to_future(&emitter.event());
/// emitter.fire(7);
/// emitter.fire(8);
/// assert_eq!(first.await, Some(7));
/// # }
/// ```
#[track_caller]
pub fn to_future<E>(source: &EventSource<E>) -> impl Future<Output = Option<E>> + Send + use<E>
where
    E: Clone + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    let tx = Mutex::new(Some(tx));
    let sub = once(source.clone()).subscribe_at(
        Arc::new(move |event: &E| {
            if let Some(tx) = tx.lock().take() {
                let _ = tx.send(event.clone());
            }
        }),
        Location::caller(),
    );

    let guard = ReleaseOnDrop(sub);
    async move {
        let first = rx.await.ok();
        drop(guard);
        first
    }
}

/// Releases the wrapped subscription when dropped.
struct ReleaseOnDrop(Subscription);

impl Drop for ReleaseOnDrop {
    fn drop(&mut self) {
        self.0.dispose();
    }
}

/// Calls `handler(None)` right away, then `handler(Some(event))` on every emission.
///
/// Useful for "compute now and whenever it changes" wiring.
#[track_caller]
pub fn run_and_subscribe<E, H>(source: &EventSource<E>, handler: H) -> Subscription
where
    E: 'static,
    H: Fn(Option<&E>) + Send + Sync + 'static,
{
    handler(None);
    source.subscribe_at(
        Arc::new(move |event: &E| handler(Some(event))),
        Location::caller(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    type Handlers = Mutex<Vec<(String, Arc<Callback<u32>>)>>;

    #[derive(Default)]
    struct FakeNotifier {
        handlers: Handlers,
        calls: Mutex<Vec<String>>,
    }

    impl FakeNotifier {
        fn emit(&self, name: &str, value: u32) {
            let targets: Vec<_> = self
                .handlers
                .lock()
                .iter()
                .filter(|(n, _)| n == name)
                .map(|(_, h)| Arc::clone(h))
                .collect();
            for handler in targets {
                handler(&value);
            }
        }
    }

    impl ExternalNotifier for FakeNotifier {
        type Event = u32;

        fn on(&self, name: &str, handler: Arc<Callback<u32>>) {
            self.calls.lock().push(format!("on:{name}"));
            self.handlers.lock().push((name.to_string(), handler));
        }

        fn off(&self, name: &str, handler: &Arc<Callback<u32>>) {
            self.calls.lock().push(format!("off:{name}"));
            self.handlers
                .lock()
                .retain(|(n, h)| !(n == name && Arc::ptr_eq(h, handler)));
        }
    }

    #[test]
    fn test_from_external_registers_with_first_listener_only() {
        let notifier = Arc::new(FakeNotifier::default());
        let source = from_external(Arc::clone(&notifier), "data");
        assert!(notifier.calls.lock().is_empty());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let a = source.subscribe(move |n| s.lock().push(*n));
        let b = source.subscribe(|_| {});
        notifier.emit("data", 5);
        notifier.emit("other", 6);

        a.dispose();
        b.dispose();
        notifier.emit("data", 7);

        assert_eq!(*seen.lock(), vec![5]);
        assert_eq!(*notifier.calls.lock(), vec!["on:data", "off:data"]);
        assert!(notifier.handlers.lock().is_empty());
    }

    #[tokio::test]
    async fn test_to_future_resolves_with_first_emission() {
        let emitter = Emitter::<u32>::new();
        let first = to_future(&emitter.event());
        assert!(emitter.has_listeners());
        emitter.fire(1);
        emitter.fire(2);
        assert_eq!(first.await, Some(1));
        assert!(!emitter.has_listeners());
    }

    #[tokio::test]
    async fn test_to_future_yields_none_on_dispose() {
        let emitter = Emitter::<u32>::new();
        let first = to_future(&emitter.event());
        emitter.dispose();
        assert_eq!(first.await, None);
    }

    #[tokio::test]
    async fn test_to_future_yields_none_when_emitter_dropped() {
        let emitter = Emitter::<u32>::new();
        let first = to_future(&emitter.event());
        drop(emitter);
        let settled = tokio::time::timeout(std::time::Duration::from_secs(1), first).await;
        assert_eq!(settled, Ok(None));
    }

    #[test]
    fn test_dropping_future_releases_subscription() {
        let emitter = Emitter::<u32>::new();
        let first = to_future(&emitter.event());
        assert!(emitter.has_listeners());
        drop(first);
        assert!(!emitter.has_listeners());
    }

    #[test]
    fn test_run_and_subscribe_calls_with_none_first() {
        let emitter = Emitter::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let _sub = run_and_subscribe(&emitter.event(), move |n| s.lock().push(n.copied()));
        emitter.fire(4);
        assert_eq!(*seen.lock(), vec![None, Some(4)]);
    }
}
