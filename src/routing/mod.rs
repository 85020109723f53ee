//! Routing primitives that move events between sources.
//!
//! - [`EventMultiplexer`]: dynamic fan-in of many sources, hooked lazily.
//! - [`EventBufferer`]: parks emissions raised inside a critical section.
//! - [`Relay`]: one stable source over a swappable input.

mod bufferer;
mod multiplexer;
mod relay;

pub use bufferer::EventBufferer;
pub use multiplexer::EventMultiplexer;
pub use relay::Relay;
