//! # Example: routing
//!
//! Moving events between sources with the routing primitives and combinators.
//!
//! Demonstrates how to:
//! - Merge several emitters with an [`EventMultiplexer`].
//! - Switch the input of a [`Relay`] while listening.
//! - Hold back emissions inside an [`EventBufferer`] section.
//! - Collapse a burst with a [`DebounceEmitter`].
//!
//! ## Run
//! ```bash
//! cargo run --example routing
//! ```

use std::time::Duration;

use fanout::{DebounceEmitter, Emitter, EventBufferer, EventMultiplexer, Relay, combinators};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // 1. Multiplexer: sources are hooked only while someone listens downstream
    let keyboard = Emitter::<String>::new();
    let mouse = Emitter::<String>::new();
    let input = EventMultiplexer::new();
    let _k = input.add(keyboard.event());
    let _m = input.add(mouse.event());
    println!("keyboard hooked before listening: {}", keyboard.has_listeners());

    let all = input
        .event()
        .subscribe(|what: &String| println!("[input] {what}"));
    keyboard.fire("key a".into());
    mouse.fire("click".into());
    all.dispose();

    // 2. Relay: one stable source, swappable upstream
    let primary = Emitter::<u32>::new();
    let backup = Emitter::<u32>::new();
    let relay = Relay::new();
    relay.set_input(primary.event());
    let _r = combinators::map(relay.event(), |n| n * 10)
        .subscribe(|n| println!("[relay] {n}"));
    primary.fire(1);
    relay.set_input(backup.event());
    primary.fire(2);
    backup.fire(3);

    // 3. Bufferer: emissions inside the section arrive after it returns
    let bufferer = EventBufferer::new();
    let changes = Emitter::<&'static str>::new();
    let _b = bufferer
        .wrap_event(changes.event())
        .subscribe(|c| println!("[buffered] {c}"));
    bufferer.buffer_events(|| {
        changes.fire("first");
        changes.fire("second");
        println!("[buffered] section done");
    });

    // 4. Debounce: three quick fires, one merged emission
    let typing = DebounceEmitter::new(Duration::from_millis(50), |keys: Vec<char>| {
        keys.last().copied().unwrap_or(' ')
    });
    let _t = typing.subscribe(|last| println!("[debounce] settled on {last:?}"));
    for key in ['h', 'e', 'y'] {
        typing.fire(key);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    tokio::time::sleep(Duration::from_millis(80)).await;
}
