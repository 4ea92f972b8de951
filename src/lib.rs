//! Employee client: a one-shot fetch of the employee list, server-push
//! notifications over an event stream, and a chat relay over STOMP.
//!
//! The binary builds an [`App`] once at startup and runs one channel per
//! subcommand. Everything the channels receive is published to the `App`'s
//! event handlers, which log it and render it into the display regions.

mod app;

pub use app::App;
