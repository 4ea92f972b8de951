use crate::session::Session;
use domain::error::{Error, InternalErrorKind};
use events::{Channel, ChatText, ClientEvent, EventPublisher};
use log::*;
use service::config::{Config, Transport};
use tokio::task::JoinHandle;
use url::Url;

/// Where the relay connects and which destinations it uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatOptions {
    pub endpoint: Url,
    pub transport: Transport,
    /// Destination chat text is published to.
    pub publish_destination: String,
    /// Topic the relay subscribes to once connected.
    pub subscribe_destination: String,
}

impl ChatOptions {
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        Ok(Self {
            endpoint: config.websocket_url()?,
            transport: config.transport,
            publish_destination: config.publish_destination.clone(),
            subscribe_destination: config.subscribe_destination.clone(),
        })
    }
}

/// Relays chat text between the user and the broker.
///
/// Outbound text goes to the publish destination as `{"text": ...}`. Messages
/// on the subscribed topic are decoded and published as
/// [`ClientEvent::ChatMessage`].
pub struct ChatRelay {
    options: ChatOptions,
    publisher: EventPublisher,
    session: Option<Session>,
    pump: Option<JoinHandle<()>>,
}

impl ChatRelay {
    pub fn new(options: ChatOptions, publisher: EventPublisher) -> Self {
        Self {
            options,
            publisher,
            session: None,
            pump: None,
        }
    }

    pub fn options(&self) -> &ChatOptions {
        &self.options
    }

    /// Opens the session and subscribes to the topic. The subscription is
    /// only sent after the server acknowledged CONNECT.
    pub async fn connect(&mut self) -> Result<(), Error> {
        let session = Session::connect(
            &self.options.endpoint,
            self.options.transport,
            self.publisher.clone(),
        )
        .await?;
        info!("WebSocket connected to {}", self.options.endpoint);

        let mut subscription = session.subscribe(&self.options.subscribe_destination)?;
        self.session = Some(session);

        self.publisher
            .publish(ClientEvent::Connected {
                channel: Channel::Chat,
            })
            .await;

        let publisher = self.publisher.clone();
        let pump = tokio::spawn(async move {
            while let Some(frame) = subscription.next().await {
                match frame.body.parse::<ChatText>() {
                    Ok(message) => publisher.publish(ClientEvent::ChatMessage(message)).await,
                    Err(e) => warn!(
                        "Skipping malformed message on {}: {e}",
                        subscription.destination()
                    ),
                }
            }
            debug!("Subscription {} ended", subscription.id());
        });

        if let Some(previous) = self.pump.replace(pump) {
            previous.abort();
        }
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.is_connected())
    }

    /// Sends `text` to the publish destination in a single SEND frame.
    pub fn publish(&self, text: &str) -> Result<(), Error> {
        let session = self
            .session
            .as_ref()
            .filter(|session| session.is_connected())
            .ok_or_else(|| Error::internal(InternalErrorKind::NotConnected))?;

        let body = ChatText::new(text).to_json();
        debug!("Publishing to {}: {body}", self.options.publish_destination);
        session.send_json(&self.options.publish_destination, body)
    }

    pub async fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            session.disconnect().await;
        }
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

impl Drop for ChatRelay {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}
