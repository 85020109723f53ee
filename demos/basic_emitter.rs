//! # Example: basic_emitter
//!
//! Synchronous fan-out with a single [`Emitter`].
//!
//! Demonstrates how to:
//! - Subscribe listeners and collect their handles in a [`DisposableStore`].
//! - Observe breadth-first delivery of a nested `fire`.
//! - Keep delivering when one listener panics (the panic is reported, not propagated).
//! - Get a leak warning when too many listeners pile up.
//!
//! ## Flow
//! ```text
//! fire("save")
//!   ├─► audit   ──► fire("saved")  (queued, runs after this round)
//!   ├─► flaky   ──► panic ──► ErrorSink (LogSink ─► tracing)
//!   └─► printer
//! fire("saved") ──► audit, flaky, printer
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=info cargo run --example basic_emitter
//! ```

use fanout::{DisposableStore, Emitter, EmitterOptions};
use tracing_subscriber::EnvFilter;

fn main() {
    // 1. Route library diagnostics to stdout
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // 2. Emitter with a name (shows up in diagnostics), low leak threshold, profiling
    let emitter = Emitter::<String>::with_options(
        EmitterOptions::new()
            .with_debug_name("documents")
            .with_leak_warning_threshold(4)
            .with_profiling(),
    );
    let store = DisposableStore::new();

    // 3. Listeners
    let again = emitter.clone();
    let _ = emitter.event().subscribe_into(
        move |what: &String| {
            println!("[audit] {what}");
            if what == "save" {
                again.fire("saved".to_string());
            }
        },
        &store,
    );
    let _ = emitter.event().subscribe_into(
        |what: &String| {
            if what == "save" {
                panic!("flaky listener gave up on {what}");
            }
        },
        &store,
    );
    let _ = emitter
        .event()
        .subscribe_into(|what: &String| println!("[printer] {what}"), &store);

    // 4. Fire
    emitter.fire("save".to_string());

    // 5. Pile up listeners to trigger the leak warning
    for _ in 0..3 {
        let _ = emitter.event().subscribe_into(|_| {}, &store);
    }
    println!("listeners attached: {}", emitter.listener_count());

    // 6. Release everything
    store.dispose();
    println!("listeners after dispose: {}", emitter.listener_count());
    emitter.dispose();
}
