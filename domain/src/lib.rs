//! Client-side domain: the error tree every crate reports through, the display
//! document inbound messages are rendered into, and the one-shot fetch channel.

pub use events::{Channel, ChatText, ClientEvent, CounterTick, EmployeeCreated};

pub mod document;
pub mod error;
pub mod fetch;
pub mod render;
