//! Engine events.
//!
//! The engine APIs publish an event after each state change that other parts of the system may care about. Hooks are
//! registered through [`EventHooks`], turned into running [`EventHandlers`], and the APIs are handed the matching
//! [`EventProducers`].
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
