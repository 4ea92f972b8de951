use crate::message::{EventType, StreamEvent};
use domain::error::{Error, ExternalErrorKind, InternalErrorKind};
use eventsource_client::{self as es, Client};
use events::{Channel, ClientEvent, EventPublisher};
use futures_util::stream::StreamExt;
use log::*;
use service::config::Config;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use url::Url;

/// Decoded events buffered for `wait_for_event` before new ones are dropped.
const EVENT_BUFFER: usize = 256;

/// Longest delay the event stream client backs off to between reconnects.
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerOptions {
    /// Let the underlying client reconnect after the stream drops.
    pub reconnect: bool,
    /// Initial reconnect delay, doubled on every consecutive failure.
    pub reconnect_delay: Duration,
}

impl ListenerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            reconnect: config.sse_reconnect,
            reconnect_delay: Duration::from_millis(config.sse_reconnect_delay_ms),
        }
    }
}

impl Default for ListenerOptions {
    fn default() -> Self {
        Self {
            reconnect: true,
            reconnect_delay: Duration::from_millis(
                service::config::DEFAULT_SSE_RECONNECT_DELAY_MS,
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Received {
    pub id: Option<String>,
    pub event: StreamEvent,
    pub timestamp: Instant,
}

/// One long-lived event stream. Every decoded event is published to the
/// `EventPublisher` and also buffered for [`Listener::wait_for_event`].
///
/// The stream is never closed by the client; dropping the listener aborts it.
pub struct Listener {
    url: Url,
    event_rx: mpsc::Receiver<Received>,
    /// `None` once `closed` has seen the task finish.
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl Listener {
    pub fn establish(
        url: Url,
        options: ListenerOptions,
        publisher: EventPublisher,
    ) -> Result<Self, Error> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);

        let reconnect = es::ReconnectOptions::reconnect(options.reconnect)
            .retry_initial(false)
            .delay(options.reconnect_delay)
            .backoff_factor(2)
            .delay_max(MAX_RECONNECT_DELAY)
            .build();

        let client = es::ClientBuilder::for_url(url.as_str())
            .map_err(|e| {
                Error::internal(InternalErrorKind::Other(format!(
                    "Invalid event stream URL {url}: {e:?}"
                )))
            })?
            .reconnect(reconnect)
            .build();

        info!("Opening event stream {url}");

        let label = url.to_string();
        let handle = tokio::spawn(async move {
            let mut stream = client.stream();
            let mut reason = None;

            loop {
                match stream.next().await {
                    Some(Ok(es::SSE::Event(event))) => {
                        match StreamEvent::decode(&event.event_type, &event.data) {
                            Ok(Some(decoded)) => {
                                publisher.publish(decoded.clone().into()).await;

                                let received = Received {
                                    id: event.id,
                                    event: decoded,
                                    timestamp: Instant::now(),
                                };
                                if tx.try_send(received).is_err() {
                                    trace!("Event buffer full for {}, dropping event", label);
                                }
                            }
                            Ok(None) => {
                                debug!(
                                    "Ignoring '{}' event from {}",
                                    event.event_type, label
                                );
                            }
                            Err(e) => {
                                warn!(
                                    "Skipping malformed '{}' event from {}: {}",
                                    event.event_type, label, e
                                );
                            }
                        }
                    }
                    Some(Ok(es::SSE::Comment(_))) => {
                        // Ignore comments (keep-alive)
                    }
                    Some(Err(e)) => {
                        if !options.reconnect {
                            debug!("SSE stream for {} ended: {:?}", label, e);
                            reason = Some(format!("{e:?}"));
                            break;
                        }
                        warn!("SSE error for {}: {:?}", label, e);
                    }
                    None => {
                        debug!("SSE stream ended for {}", label);
                        break;
                    }
                }
            }

            publisher
                .publish(ClientEvent::Disconnected {
                    channel: Channel::EventStream,
                    reason,
                })
                .await;
        });

        Ok(Self {
            url,
            event_rx: rx,
            handle: Some(handle),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Waits for the next buffered event named `event_type`, discarding others.
    pub async fn wait_for_event(
        &mut self,
        event_type: &str,
        timeout: Duration,
    ) -> Result<Received, Error> {
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::external(ExternalErrorKind::Timeout));
            }

            match tokio::time::timeout(remaining, self.event_rx.recv()).await {
                Ok(Some(received)) if received.event.event_type() == event_type => {
                    return Ok(received);
                }
                Ok(Some(_)) => {
                    // Wrong event type, keep waiting
                    continue;
                }
                Ok(None) => {
                    return Err(Error::protocol("Event stream closed"));
                }
                Err(_) => {
                    return Err(Error::external(ExternalErrorKind::Timeout));
                }
            }
        }
    }

    /// Resolves once the stream has ended for good. Returns at once on later calls.
    pub async fn closed(&mut self) {
        let Some(handle) = self.handle.as_mut() else {
            return;
        };
        if let Err(e) = handle.await {
            if !e.is_cancelled() {
                error!("Event stream task for {} failed: {e}", self.url);
            }
        }
        self.handle = None;
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{COUNTER_EVENT, MESSAGE_EVENT};
    use async_trait::async_trait;
    use domain::document::{BufferRegion, Document, MESSAGES_DIV, MESSAGE_DIV};
    use domain::error::DomainErrorKind;
    use domain::render::DisplayHandler;
    use events::{CounterTick, EmployeeCreated, EventHandler};
    use mockito::{Mock, Server, ServerGuard};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<ClientEvent>>,
    }

    #[async_trait]
    impl EventHandler for Recorder {
        async fn handle(&self, event: &ClientEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn no_reconnect() -> ListenerOptions {
        ListenerOptions {
            reconnect: false,
            reconnect_delay: Duration::from_millis(10),
        }
    }

    async fn serve_stream(path: &str, body: &str) -> (ServerGuard, Mock) {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", path)
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await;
        (server, mock)
    }

    #[tokio::test]
    async fn test_message_event_is_published_and_buffered() {
        let (server, _mock) = serve_stream(
            "/api/employees/messages",
            "id: 1\nevent: message\ndata: {\"employeeName\":\"Bob\"}\n\n",
        )
        .await;
        let recorder = Arc::new(Recorder::default());
        let publisher = EventPublisher::new().with_handler(recorder.clone());
        let url = Url::parse(&format!("{}/api/employees/messages", server.url())).unwrap();

        let mut listener = Listener::establish(url, no_reconnect(), publisher).unwrap();
        let received = listener
            .wait_for_event(MESSAGE_EVENT, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(received.id.as_deref(), Some("1"));
        assert_eq!(
            received.event,
            StreamEvent::EmployeeCreated(EmployeeCreated {
                employee_name: "Bob".to_string()
            })
        );
        assert!(recorder
            .events
            .lock()
            .unwrap()
            .contains(&ClientEvent::EmployeeCreated(EmployeeCreated {
                employee_name: "Bob".to_string()
            })));
    }

    #[tokio::test]
    async fn test_malformed_event_is_skipped() {
        let (server, _mock) = serve_stream(
            "/api/employees/messages",
            concat!(
                ": keep-alive\n\n",
                "event: message\ndata: {\"employeeName\":\n\n",
                "event: message\ndata: {\"employeeName\":\"Carol\"}\n\n",
            ),
        )
        .await;
        let url = Url::parse(&format!("{}/api/employees/messages", server.url())).unwrap();

        let mut listener = Listener::establish(url, no_reconnect(), EventPublisher::new()).unwrap();
        let received = listener
            .wait_for_event(MESSAGE_EVENT, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(
            received.event,
            StreamEvent::EmployeeCreated(EmployeeCreated {
                employee_name: "Carol".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_wait_for_event_skips_other_event_types() {
        let (server, _mock) = serve_stream(
            "/api/counter",
            concat!(
                "event: message\ndata: {\"employeeName\":\"Bob\"}\n\n",
                "event: counter\ndata: {\"counter\":0}\n\n",
            ),
        )
        .await;
        let url = Url::parse(&format!("{}/api/counter", server.url())).unwrap();

        let mut listener = Listener::establish(url, no_reconnect(), EventPublisher::new()).unwrap();
        let received = listener
            .wait_for_event(COUNTER_EVENT, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(received.event, StreamEvent::Counter(CounterTick { counter: 0 }));
    }

    #[tokio::test]
    async fn test_unnamed_event_is_a_message_event() {
        let (server, _mock) = serve_stream(
            "/api/employees/messages",
            "data: {\"employeeName\":\"Bob\"}\n\n",
        )
        .await;
        let messages = Arc::new(BufferRegion::new(MESSAGES_DIV));
        let document = Document::new()
            .with_region(messages.clone())
            .with_region(Arc::new(BufferRegion::new(MESSAGE_DIV)));
        let publisher =
            EventPublisher::new().with_handler(Arc::new(DisplayHandler::new(&document).unwrap()));
        let url = Url::parse(&format!("{}/api/employees/messages", server.url())).unwrap();

        let mut listener = Listener::establish(url, no_reconnect(), publisher).unwrap();
        let received = listener
            .wait_for_event(MESSAGE_EVENT, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(
            received.event,
            StreamEvent::EmployeeCreated(EmployeeCreated {
                employee_name: "Bob".to_string()
            })
        );
        assert_eq!(messages.lines(), vec!["Employee has been created: Bob".to_string()]);
        assert_eq!(messages.content(), "<p>Employee has been created: Bob</p>");
    }

    #[tokio::test]
    async fn test_closed_stream_reports_disconnect() {
        let (server, _mock) = serve_stream("/api/employees/messages", "").await;
        let recorder = Arc::new(Recorder::default());
        let publisher = EventPublisher::new().with_handler(recorder.clone());
        let url = Url::parse(&format!("{}/api/employees/messages", server.url())).unwrap();

        let mut listener = Listener::establish(url, no_reconnect(), publisher).unwrap();
        tokio::time::timeout(Duration::from_secs(5), listener.closed())
            .await
            .unwrap();
        // Already finished, must not poll the task again
        tokio::time::timeout(Duration::from_secs(1), listener.closed())
            .await
            .unwrap();

        let events = recorder.events.lock().unwrap();
        assert!(matches!(
            events.last(),
            Some(ClientEvent::Disconnected {
                channel: Channel::EventStream,
                ..
            })
        ));

        drop(events);
        let err = listener
            .wait_for_event(MESSAGE_EVENT, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err.error_kind, DomainErrorKind::External(_)));
    }

    #[test]
    fn test_options_from_config() {
        use clap::Parser;

        let config = Config::try_parse_from([
            "empapp_client",
            "--sse-reconnect",
            "false",
            "--sse-reconnect-delay-ms",
            "250",
            "listen",
        ])
        .unwrap();

        assert_eq!(
            ListenerOptions::from_config(&config),
            ListenerOptions {
                reconnect: false,
                reconnect_delay: Duration::from_millis(250),
            }
        );
    }
}
