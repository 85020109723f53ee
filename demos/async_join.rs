//! # Example: async_join
//!
//! Sequential async listeners that hold up the emitter with `wait_until`.
//!
//! Demonstrates how to:
//! - Join futures from inside a listener with [`AsyncEvent::wait_until`].
//! - Observe that join latencies add up across listeners.
//! - Stop remaining listeners by cancelling the token.
//! - Collect failed joins through a custom [`ErrorSink`].
//!
//! ## Flow
//! ```text
//! fire_async("flush")
//!   ├─► disk   ─► wait_until(sleep 300ms)  ─► awaited
//!   ├─► remote ─► wait_until(Err(timeout)) ─► ErrorSink (join_failed)
//!   └─► cache  ─► wait_until(sleep 200ms)  ─► awaited
//! total ≈ 500ms
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example async_join
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use fanout::{AsyncEmitter, BoxError, DispatchError, EmitterOptions, ErrorSink};
use tokio_util::sync::CancellationToken;

/// Prints every reported error with its label.
struct PrintSink;

impl ErrorSink for PrintSink {
    fn on_error(&self, error: &DispatchError) {
        println!(
            "[sink] {} from {}: {error}",
            error.as_label(),
            error.emitter().unwrap_or("unnamed")
        );
    }
}

async fn pause(ms: u64) -> Result<(), BoxError> {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let emitter = AsyncEmitter::<&'static str>::with_options(
        EmitterOptions::new()
            .with_debug_name("storage")
            .with_error_sink(Arc::new(PrintSink)),
    );

    let _disk = emitter.subscribe(|event| {
        println!("[disk] {}", event.data());
        let _ = event.wait_until(pause(300));
    });
    let _remote = emitter.subscribe(|event| {
        println!("[remote] {}", event.data());
        let _ = event.wait_until(async { Err::<(), BoxError>("remote timed out".into()) });
    });
    let _cache = emitter.subscribe(|event| {
        println!("[cache] {}", event.data());
        if **event == "shutdown" {
            event.token().cancel();
            return;
        }
        let _ = event.wait_until(pause(200));
    });

    let started = Instant::now();
    emitter.fire_async("flush", &CancellationToken::new()).await;
    println!("flush took {:?}", started.elapsed());

    // A cancelled token stops before the next listener.
    let token = CancellationToken::new();
    token.cancel();
    emitter.fire_async("ignored", &token).await;

    emitter.dispose();
}
