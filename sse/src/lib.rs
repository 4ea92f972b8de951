//! Server-Sent Events listener for the backend's push streams.
//!
//! # Architecture
//!
//! - **One listener per stream**: a [`Listener`] owns one long-lived
//!   connection and a task that reads it. The client never closes the stream;
//!   dropping the listener aborts the task.
//! - **Reconnects belong to the transport**: `eventsource-client` reconnects on
//!   its own, starting from the configured delay. The listener adds no retry,
//!   deduplication or ordering of its own.
//! - **Typed at the boundary**: event data is decoded into a [`StreamEvent`]
//!   before anyone sees it. Malformed data is logged and skipped so the stream
//!   keeps running.
//!
//! # Streams
//!
//! - `message` events carry `{"employeeName": string}`
//! - `counter` events carry `{"counter": number}`
//!
//! # Modules
//!
//! - `listener`: connection task, options and `wait_for_event`
//! - `message`: event names and decoding

pub mod listener;
pub mod message;

pub use listener::{Listener, ListenerOptions, Received};
pub use message::{EventType, StreamEvent};
