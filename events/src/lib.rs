//! Event system for the empapp client.
//!
//! Each channel (fetch, event stream, chat) decodes what it receives into a
//! [`ClientEvent`] and hands it to an [`EventPublisher`]. Handlers registered
//! on the publisher decide what to do with it: render into a display region,
//! log it, or capture it in a test.
//!
//! # Architecture
//!
//! - **payload**: typed wire payloads, validated when parsed
//! - **ClientEvent**: everything a channel can report
//! - **EventHandler**: trait for implementing event handlers
//! - **EventPublisher**: publishes events to registered handlers
//!
//! This crate has no dependencies on internal crates, so every channel crate
//! can depend on it without cycles.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

pub mod payload;

pub use payload::{ChatText, CounterTick, EmployeeCreated};

/// The data channel an event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Fetch,
    EventStream,
    Chat,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Channel::Fetch => write!(f, "fetch"),
            Channel::EventStream => write!(f, "event-stream"),
            Channel::Chat => write!(f, "chat"),
        }
    }
}

/// Events reported by the client's channels.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// A one-shot GET completed and its body parsed as JSON.
    Fetched { url: String, body: Value },
    /// A `message` event arrived on the employees stream.
    EmployeeCreated(EmployeeCreated),
    /// A `counter` event arrived on the counter stream.
    CounterTick(CounterTick),
    /// A chat message arrived on the subscribed topic.
    ChatMessage(ChatText),
    /// A long-lived channel is open and ready.
    Connected { channel: Channel },
    /// A long-lived channel ended.
    Disconnected {
        channel: Channel,
        reason: Option<String>,
    },
}

/// Trait for handling client events.
/// Implementations can perform side effects like rendering, logging, etc.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &ClientEvent);
}

/// Publishes client events to registered handlers.
/// Handlers are called sequentially in registration order.
#[derive(Clone)]
pub struct EventPublisher {
    handlers: Arc<Vec<Arc<dyn EventHandler>>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Vec::new()),
        }
    }

    /// Register a new event handler.
    /// Note: This creates a new publisher instance with the additional handler.
    /// Clones taken before the call do not see the new handler.
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        let mut handlers = (*self.handlers).clone();
        handlers.push(handler);
        self.handlers = Arc::new(handlers);
        self
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Publish an event to all registered handlers.
    pub async fn publish(&self, event: ClientEvent) {
        for handler in self.handlers.iter() {
            handler.handle(&event).await;
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}
