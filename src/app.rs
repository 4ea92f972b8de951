use domain::document::Document;
use domain::error::{Error, InternalErrorKind};
use domain::fetch::Fetcher;
use domain::render::{DisplayHandler, LogHandler};
use events::{EventHandler, EventPublisher};
use log::*;
use serde_json::Value;
use service::config::Config;
use sse::{Listener, ListenerOptions};
use std::sync::Arc;
use stomp::{ChatOptions, ChatRelay};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use url::Url;

/// Application context, created once at startup by [`App::init`].
///
/// Holds the configuration, the display document, the event publisher every
/// channel reports to, and the open channels. Dropping the `App` stops every
/// task it started.
pub struct App {
    config: Config,
    document: Document,
    publisher: EventPublisher,
    listener: Option<Listener>,
    chat: Option<ChatRelay>,
}

impl App {
    /// Wires the logging and display sinks. Fails with `MissingElement` when
    /// `document` lacks one of the display regions.
    pub fn init(config: Config, document: Document) -> Result<Self, Error> {
        let display = DisplayHandler::new(&document)?;
        let publisher = EventPublisher::new()
            .with_handler(Arc::new(LogHandler))
            .with_handler(Arc::new(display));
        debug!(
            "Client initialized against {} with {} event handlers",
            config.base_url(),
            publisher.handler_count()
        );

        Ok(Self {
            config,
            document,
            publisher,
            listener: None,
            chat: None,
        })
    }

    /// Adds an event handler. Channels opened afterwards report to it too.
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.publisher = self.publisher.with_handler(handler);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn publisher(&self) -> &EventPublisher {
        &self.publisher
    }

    pub fn listener(&mut self) -> Option<&mut Listener> {
        self.listener.as_mut()
    }

    pub fn chat(&self) -> Option<&ChatRelay> {
        self.chat.as_ref()
    }

    /// GETs the employee list once and hands the body to the logging sink.
    pub async fn fetch(&self) -> Result<Value, Error> {
        let fetcher = Fetcher::new(self.publisher.clone())?;
        fetcher.fetch_and_log(self.config.employees_url()?).await
    }

    /// Opens the employees message stream.
    pub fn listen(&mut self) -> Result<&mut Listener, Error> {
        let url = self.config.messages_url()?;
        self.open_stream(url)
    }

    /// Opens the counter stream.
    pub fn follow_counter(&mut self) -> Result<&mut Listener, Error> {
        let url = self.config.counter_url()?;
        self.open_stream(url)
    }

    fn open_stream(&mut self, url: Url) -> Result<&mut Listener, Error> {
        info!("Listening on {url}");
        let listener = Listener::establish(
            url,
            ListenerOptions::from_config(&self.config),
            self.publisher.clone(),
        )?;
        Ok(self.listener.insert(listener))
    }

    /// Connects the chat relay and subscribes to the chat topic.
    pub async fn join_chat(&mut self) -> Result<&ChatRelay, Error> {
        let mut relay = ChatRelay::new(
            ChatOptions::from_config(&self.config)?,
            self.publisher.clone(),
        );
        relay.connect().await?;
        Ok(self.chat.insert(relay))
    }

    /// Publishes one chat message.
    pub fn send_chat(&self, text: &str) -> Result<(), Error> {
        self.chat
            .as_ref()
            .ok_or_else(|| Error::internal(InternalErrorKind::NotConnected))?
            .publish(text)
    }

    /// Publishes every line of `input` as one chat message, until EOF.
    /// Returns the number of messages sent.
    pub async fn relay_lines<R>(&self, input: R) -> Result<usize, Error>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let mut sent = 0;
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| Error::internal(InternalErrorKind::Other(e.to_string())))?
        {
            self.send_chat(&line)?;
            sent += 1;
        }
        Ok(sent)
    }

    /// Closes the chat session and the event stream.
    pub async fn shutdown(&mut self) {
        if let Some(mut chat) = self.chat.take() {
            chat.disconnect().await;
        }
        self.listener = None;
    }
}
