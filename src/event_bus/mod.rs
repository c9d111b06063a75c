//! Structured run observability: events, sinks, and the fan-out bus.
//!
//! Handlers and the executor send [`Event`]s over a channel; a background
//! listener owned by [`EventBus`] broadcasts each one to every configured
//! [`EventSink`].

pub mod bus;
pub mod event;
pub mod sink;

pub use bus::EventBus;
pub use event::{DiagnosticEvent, Event, NodeEvent};
pub use sink::{ChannelSink, EventSink, MemorySink, StdOutSink};
