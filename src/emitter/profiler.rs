//! # Fire profiler
//!
//! Measures each top-level `fire`: elapsed time, listener count, running total.
//! Output goes to `tracing` under the `fanout::profile` target.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[derive(Default)]
struct ProfileState {
    started: Option<(Instant, usize)>,
    elapsed_overall: Duration,
    invocations: u64,
}

/// Per-emitter timing instrumentation.
pub(crate) struct EventProfiling {
    name: Arc<str>,
    state: Mutex<ProfileState>,
}

impl EventProfiling {
    pub(crate) fn new(name: Option<Arc<str>>) -> Self {
        Self {
            name: name.unwrap_or_else(|| Arc::from("emitter")),
            state: Mutex::new(ProfileState::default()),
        }
    }

    pub(crate) fn start(&self, listener_count: usize) {
        self.state.lock().started = Some((Instant::now(), listener_count));
    }

    pub(crate) fn stop(&self) {
        let mut state = self.state.lock();
        let Some((started, listeners)) = state.started.take() else {
            return;
        };
        let elapsed = started.elapsed();
        state.elapsed_overall += elapsed;
        state.invocations += 1;
        tracing::info!(
            target: "fanout::profile",
            emitter = %self.name,
            elapsed_ms = elapsed.as_secs_f64() * 1_000.0,
            listeners,
            elapsed_overall_ms = state.elapsed_overall.as_secs_f64() * 1_000.0,
            invocations = state.invocations,
            "did fire"
        );
    }

    /// Completed measurements so far.
    #[cfg(test)]
    pub(crate) fn invocations(&self) -> u64 {
        self.state.lock().invocations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_without_start_is_ignored() {
        let p = EventProfiling::new(None);
        p.stop();
        assert_eq!(p.invocations(), 0);
    }

    #[test]
    fn test_counts_invocations() {
        let p = EventProfiling::new(Some("x".into()));
        p.start(3);
        p.stop();
        p.start(1);
        p.stop();
        assert_eq!(p.invocations(), 2);
    }
}
