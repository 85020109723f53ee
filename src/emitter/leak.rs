//! # Leak monitor
//!
//! Tallies live subscriptions by call-site once an emitter's listener count
//! exceeds its threshold, and warns (rate-limited) naming the most frequent
//! site.
//!
//! ## Rules
//! - Threshold `0` never warns (the monitor is not even created).
//! - Only listeners added while `count > threshold` are tallied.
//! - The countdown starts at `0`, so the first crossing warns; after each
//!   warning it resets to `max(1, threshold / 2)`.
//! - Releasing a tallied listener decrements its site's tally.
//! - A warning is a single [`DispatchError::ListenerLeak`] report; with no sink
//!   configured it reaches the log exactly once through `LogSink`.

use std::collections::HashMap;
use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::error::{DispatchError, ErrorSink, report};

type Site = &'static Location<'static>;

struct LeakState {
    tally: HashMap<Site, usize>,
    countdown: usize,
}

/// Per-emitter listener growth monitor.
pub(crate) struct LeakageMonitor {
    name: Option<Arc<str>>,
    threshold: usize,
    state: Mutex<LeakState>,
    warnings: AtomicUsize,
}

impl LeakageMonitor {
    /// Returns `None` when `threshold` is `0`.
    pub(crate) fn new(name: Option<Arc<str>>, threshold: usize) -> Option<Self> {
        (threshold > 0).then(|| Self {
            name,
            threshold,
            state: Mutex::new(LeakState {
                tally: HashMap::new(),
                countdown: 0,
            }),
            warnings: AtomicUsize::new(0),
        })
    }

    /// Records a new listener from `site` when `listener_count` exceeds the threshold.
    ///
    /// Returns `true` if the listener was tallied (and must be released via [`Self::release`]).
    pub(crate) fn check(
        &self,
        site: Site,
        listener_count: usize,
        sink: Option<&Arc<dyn ErrorSink>>,
    ) -> bool {
        if listener_count <= self.threshold {
            return false;
        }

        let warning = {
            let mut state = self.state.lock();
            *state.tally.entry(site).or_insert(0) += 1;
            state.countdown = state.countdown.saturating_sub(1);
            if state.countdown > 0 {
                None
            } else {
                state.countdown = (self.threshold / 2).max(1);
                state
                    .tally
                    .iter()
                    .max_by_key(|(_, count)| **count)
                    .map(|(site, count)| (*site, *count))
            }
        };

        if let Some((top_site, top_count)) = warning {
            self.warnings.fetch_add(1, Ordering::Relaxed);
            // Logged by `LogSink` when no other sink is installed.
            report(
                sink,
                DispatchError::ListenerLeak {
                    emitter: self.name.clone(),
                    listeners: listener_count,
                    site: top_site,
                    count: top_count,
                },
            );
        }
        true
    }

    /// Decrements the tally of a released listener.
    pub(crate) fn release(&self, site: Site) {
        let mut state = self.state.lock();
        if let Some(count) = state.tally.get_mut(site) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                state.tally.remove(site);
            }
        }
    }

    /// Number of warnings issued so far.
    #[cfg(test)]
    pub(crate) fn warnings(&self) -> usize {
        self.warnings.load(Ordering::Relaxed)
    }

    /// Live tallied listeners from `site`.
    #[cfg(test)]
    pub(crate) fn tally_of(&self, site: Site) -> usize {
        self.state.lock().tally.get(site).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::tests::Collect;

    fn sink() -> (Arc<Collect>, Arc<dyn ErrorSink>) {
        let collect = Arc::new(Collect::default());
        let sink: Arc<dyn ErrorSink> = collect.clone();
        (collect, sink)
    }

    #[test]
    fn test_zero_threshold_disables_monitor() {
        assert!(LeakageMonitor::new(None, 0).is_none());
    }

    #[test]
    fn test_warns_on_first_crossing_then_every_half_threshold() {
        let (collect, sink) = sink();
        let monitor = LeakageMonitor::new(Some("m".into()), 4).unwrap();
        let site = Location::caller();

        for count in 1..=4 {
            assert!(!monitor.check(site, count, Some(&sink)));
        }
        assert_eq!(monitor.warnings(), 0);

        assert!(monitor.check(site, 5, Some(&sink)));
        assert_eq!(monitor.warnings(), 1);
        assert!(monitor.check(site, 6, Some(&sink)));
        assert_eq!(monitor.warnings(), 1);
        assert!(monitor.check(site, 7, Some(&sink)));
        assert_eq!(monitor.warnings(), 2);
        assert_eq!(collect.labels(), vec!["listener_leak", "listener_leak"]);
    }

    #[test]
    fn test_release_decrements_tally() {
        let (_collect, sink) = sink();
        let monitor = LeakageMonitor::new(None, 1).unwrap();
        let site = Location::caller();
        assert!(monitor.check(site, 2, Some(&sink)));
        assert!(monitor.check(site, 3, Some(&sink)));
        assert_eq!(monitor.tally_of(site), 2);
        monitor.release(site);
        assert_eq!(monitor.tally_of(site), 1);
        monitor.release(site);
        monitor.release(site);
        assert_eq!(monitor.tally_of(site), 0);
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_warning_is_logged_once_without_sink() {
        let _serial = crate::error::tests::serial();
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let monitor = LeakageMonitor::new(Some("quiet".into()), 1).unwrap();
        tracing::subscriber::with_default(subscriber, || {
            assert!(monitor.check(Location::caller(), 2, None));
        });

        let output = String::from_utf8_lossy(&captured.0.lock()).into_owned();
        assert_eq!(output.matches("potential listener leak").count(), 1);
        assert!(output.contains("quiet"));
    }
}
