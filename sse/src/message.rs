use domain::error::Error;
use events::{ClientEvent, CounterTick, EmployeeCreated};

/// Event name of the employees stream's notifications.
pub const MESSAGE_EVENT: &str = "message";
/// Event name of the counter stream's ticks.
pub const COUNTER_EVENT: &str = "counter";

/// Trait for getting the SSE event type name
pub trait EventType {
    fn event_type(&self) -> &'static str;
}

/// A stream event the client understands, decoded from its `data:` field.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    EmployeeCreated(EmployeeCreated),
    Counter(CounterTick),
}

impl StreamEvent {
    /// Decodes the data of an event named `event_type`.
    ///
    /// Returns `Ok(None)` for event names the client does not handle and an
    /// error when a known event carries malformed data.
    pub fn decode(event_type: &str, data: &str) -> Result<Option<Self>, Error> {
        match event_type {
            MESSAGE_EVENT => Ok(Some(StreamEvent::EmployeeCreated(data.parse()?))),
            COUNTER_EVENT => Ok(Some(StreamEvent::Counter(data.parse()?))),
            _ => Ok(None),
        }
    }
}

impl EventType for StreamEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StreamEvent::EmployeeCreated(_) => MESSAGE_EVENT,
            StreamEvent::Counter(_) => COUNTER_EVENT,
        }
    }
}

impl From<StreamEvent> for ClientEvent {
    fn from(event: StreamEvent) -> Self {
        match event {
            StreamEvent::EmployeeCreated(payload) => ClientEvent::EmployeeCreated(payload),
            StreamEvent::Counter(tick) => ClientEvent::CounterTick(tick),
        }
    }
}
