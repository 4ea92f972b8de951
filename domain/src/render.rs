use crate::document::{Document, Region, MESSAGES_DIV, MESSAGE_DIV};
use crate::error::Error;
use async_trait::async_trait;
use events::{ClientEvent, EventHandler};
use log::*;
use std::sync::Arc;

/// Renders a client event as one display line and names the region it belongs in.
/// Events that are not displayed return `None`.
pub fn render(event: &ClientEvent) -> Option<(&'static str, String)> {
    match event {
        ClientEvent::EmployeeCreated(payload) => Some((
            MESSAGES_DIV,
            format!("Employee has been created: {}", payload.employee_name),
        )),
        ClientEvent::CounterTick(tick) => {
            Some((MESSAGES_DIV, format!("Counter: {}", tick.counter)))
        }
        ClientEvent::ChatMessage(message) => Some((MESSAGE_DIV, message.text.clone())),
        ClientEvent::Fetched { .. }
        | ClientEvent::Connected { .. }
        | ClientEvent::Disconnected { .. } => None,
    }
}

/// Appends rendered events to the document's display regions.
pub struct DisplayHandler {
    messages: Arc<dyn Region>,
    chat: Arc<dyn Region>,
}

impl DisplayHandler {
    /// Looks both regions up once; a document without them is rejected here
    /// rather than on the first inbound message.
    pub fn new(document: &Document) -> Result<Self, Error> {
        Ok(Self {
            messages: document.query_selector(MESSAGES_DIV)?,
            chat: document.query_selector(MESSAGE_DIV)?,
        })
    }
}

#[async_trait]
impl EventHandler for DisplayHandler {
    async fn handle(&self, event: &ClientEvent) {
        if let Some((selector, line)) = render(event) {
            let region = if selector == MESSAGE_DIV {
                &self.chat
            } else {
                &self.messages
            };
            region.append(&line);
        }
    }
}

/// The logging sink: writes every event to the log.
pub struct LogHandler;

#[async_trait]
impl EventHandler for LogHandler {
    async fn handle(&self, event: &ClientEvent) {
        match event {
            ClientEvent::Fetched { url, body } => info!("Fetched {url}: {body}"),
            ClientEvent::EmployeeCreated(payload) => info!("{}", payload.employee_name),
            ClientEvent::CounterTick(tick) => debug!("Counter tick {}", tick.counter),
            ClientEvent::ChatMessage(message) => info!("Message has come: {}", message.text),
            ClientEvent::Connected { channel } => info!("{channel} channel connected"),
            ClientEvent::Disconnected { channel, reason } => match reason {
                Some(reason) => warn!("{channel} channel disconnected: {reason}"),
                None => info!("{channel} channel disconnected"),
            },
        }
    }
}
