use crate::frame::{Command, Frame};
use crate::transport::{self, Inbound};
use dashmap::DashMap;
use domain::error::{DomainErrorKind, Error, ExternalErrorKind, InternalErrorKind};
use events::{Channel, ClientEvent, EventPublisher};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::*;
use service::config::Transport;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound for opening the socket and for the CONNECT/CONNECTED exchange.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// How long `disconnect` waits for the DISCONNECT frame to be flushed.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

type Routes = DashMap<String, mpsc::UnboundedSender<Frame>>;

/// MESSAGE frames delivered to one subscription.
pub struct Subscription {
    id: String,
    destination: String,
    rx: mpsc::UnboundedReceiver<Frame>,
}

impl Subscription {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// The next MESSAGE frame, or `None` once the session has ended.
    pub async fn next(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }
}

/// A connected STOMP session.
///
/// A `Session` only exists once the server answered CONNECT with CONNECTED, so
/// every SUBSCRIBE and SEND goes out after the connect callback has fired.
pub struct Session {
    outbound: mpsc::UnboundedSender<Frame>,
    routes: Arc<Routes>,
    next_subscription: AtomicU32,
    version: Option<String>,
    /// Cleared by the reader before it reports the session as disconnected.
    open: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    writer: Option<JoinHandle<()>>,
}

impl Session {
    pub async fn connect(
        endpoint: &Url,
        transport: Transport,
        publisher: EventPublisher,
    ) -> Result<Self, Error> {
        let url = transport::target_url(transport, endpoint);
        info!("Opening STOMP session on {url}");

        let (socket, _response) = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(url.as_str()))
            .await
            .map_err(|_| Error::external(ExternalErrorKind::Timeout))?
            .map_err(|e| {
                warn!("Failed to open WebSocket {url}: {e}");
                Error::network(e)
            })?;
        let (mut sink, mut stream) = socket.split();

        let host = endpoint.host_str().unwrap_or("localhost").to_string();
        let connect = Frame::new(Command::Connect)
            .header("accept-version", "1.1,1.2")
            .header("host", &host)
            .header("heart-beat", "0,0");

        let connected = tokio::time::timeout(
            CONNECT_TIMEOUT,
            handshake(&mut sink, &mut stream, transport, &connect),
        )
        .await
        .map_err(|_| Error::external(ExternalErrorKind::Timeout))??;

        let version = connected.get("version").map(str::to_string);
        debug!(
            "STOMP session established (version {})",
            version.as_deref().unwrap_or("1.0")
        );

        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(write_frames(sink, outbound_rx, transport));

        let routes = Arc::new(Routes::new());
        let open = Arc::new(AtomicBool::new(true));
        let reader = tokio::spawn(read_frames(
            stream,
            routes.clone(),
            open.clone(),
            transport,
            publisher,
        ));

        Ok(Self {
            outbound,
            routes,
            next_subscription: AtomicU32::new(0),
            version,
            open,
            reader,
            writer: Some(writer),
        })
    }

    /// The protocol version from the server's CONNECTED frame.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Whether the server side of the session is still open.
    pub fn is_connected(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.reader.is_finished()
    }

    pub fn subscribe(&self, destination: &str) -> Result<Subscription, Error> {
        let id = format!(
            "sub-{}",
            self.next_subscription.fetch_add(1, Ordering::Relaxed)
        );
        let (tx, rx) = mpsc::unbounded_channel();
        self.routes.insert(id.clone(), tx);

        let frame = Frame::new(Command::Subscribe)
            .header("id", &id)
            .header("destination", destination)
            .header("ack", "auto");
        if let Err(e) = self.enqueue(frame) {
            self.routes.remove(&id);
            return Err(e);
        }

        debug!("Subscribed to {destination} as {id}");
        Ok(Subscription {
            id,
            destination: destination.to_string(),
            rx,
        })
    }

    /// Queues one SEND frame carrying a JSON body.
    pub fn send_json(&self, destination: &str, body: String) -> Result<(), Error> {
        self.enqueue(
            Frame::new(Command::Send)
                .header("destination", destination)
                .header("content-type", "application/json")
                .body(body),
        )
    }

    /// Sends DISCONNECT and closes the socket once it is written.
    pub async fn disconnect(mut self) {
        if self.enqueue(Frame::new(Command::Disconnect)).is_err() {
            return;
        }
        let writer = self.writer.take();
        // Dropping the session closes the outbound queue, which ends the writer
        drop(self);
        if let Some(writer) = writer {
            let _ = tokio::time::timeout(FLUSH_TIMEOUT, writer).await;
        }
    }

    fn enqueue(&self, frame: Frame) -> Result<(), Error> {
        if !self.is_connected() {
            return Err(Error::internal(InternalErrorKind::NotConnected));
        }
        self.outbound
            .send(frame)
            .map_err(|_| Error::internal(InternalErrorKind::NotConnected))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn next_inbound(
    stream: &mut SplitStream<WsStream>,
    transport: Transport,
) -> Result<Inbound, Error> {
    match stream.next().await {
        Some(Ok(message)) => transport::from_message(transport, message),
        Some(Err(e)) => Err(Error::network(e)),
        None => Ok(Inbound::Closed(None)),
    }
}

/// Waits for the SockJS open frame if needed, sends CONNECT and returns the
/// server's CONNECTED frame.
async fn handshake(
    sink: &mut SplitSink<WsStream, Message>,
    stream: &mut SplitStream<WsStream>,
    transport: Transport,
    connect: &Frame,
) -> Result<Frame, Error> {
    if transport == Transport::SockJs {
        loop {
            match next_inbound(stream, transport).await? {
                Inbound::Open => break,
                Inbound::Idle => continue,
                Inbound::Frames(_) => {
                    return Err(Error::protocol("STOMP frame before SockJS open frame"))
                }
                Inbound::Closed(reason) => return Err(closed_during_connect(reason)),
            }
        }
    }

    sink.send(transport::to_message(transport, connect))
        .await
        .map_err(Error::network)?;

    loop {
        match next_inbound(stream, transport).await? {
            Inbound::Frames(frames) => {
                for frame in frames {
                    match frame.command {
                        Command::Connected => return Ok(frame),
                        Command::Error => return Err(Error::protocol(error_reason(&frame))),
                        other => debug!("Ignoring {other} frame before CONNECTED"),
                    }
                }
            }
            Inbound::Open | Inbound::Idle => continue,
            Inbound::Closed(reason) => return Err(closed_during_connect(reason)),
        }
    }
}

fn closed_during_connect(reason: Option<String>) -> Error {
    Error::protocol(format!(
        "Connection closed before CONNECTED: {}",
        reason.unwrap_or_else(|| "no reason given".to_string())
    ))
}

fn error_reason(frame: &Frame) -> String {
    let message = frame.get("message").unwrap_or("STOMP ERROR frame");
    let details = frame.body.trim();
    if details.is_empty() {
        message.to_string()
    } else {
        format!("{message}: {details}")
    }
}

async fn write_frames(
    mut sink: SplitSink<WsStream, Message>,
    mut outbound: mpsc::UnboundedReceiver<Frame>,
    transport: Transport,
) {
    while let Some(frame) = outbound.recv().await {
        trace!("STOMP >>> {}", frame.command);
        if let Err(e) = sink.send(transport::to_message(transport, &frame)).await {
            error!("Failed to send STOMP {} frame: {e}", frame.command);
            break;
        }
    }
    let _ = sink.close().await;
}

async fn read_frames(
    mut stream: SplitStream<WsStream>,
    routes: Arc<Routes>,
    open: Arc<AtomicBool>,
    transport: Transport,
    publisher: EventPublisher,
) {
    let reason = 'read: loop {
        match next_inbound(&mut stream, transport).await {
            Ok(Inbound::Frames(frames)) => {
                for frame in frames {
                    if let Err(reason) = dispatch(&routes, frame) {
                        break 'read Some(reason);
                    }
                }
            }
            Ok(Inbound::Open) | Ok(Inbound::Idle) => {}
            Ok(Inbound::Closed(reason)) => break reason,
            // A garbled message is dropped, the socket is still usable
            Err(Error {
                error_kind: DomainErrorKind::External(ExternalErrorKind::Protocol(reason)),
                ..
            }) => warn!("Skipping malformed inbound message: {reason}"),
            Err(e) => {
                error!("Transport error on STOMP session: {e}");
                break Some(e.to_string());
            }
        }
    };

    open.store(false, Ordering::Release);
    // Ends every subscription stream
    routes.clear();

    publisher
        .publish(ClientEvent::Disconnected {
            channel: Channel::Chat,
            reason,
        })
        .await;
}

/// Routes one inbound frame. An ERROR frame ends the session.
fn dispatch(routes: &Routes, frame: Frame) -> Result<(), String> {
    trace!("STOMP <<< {}", frame.command);
    match frame.command {
        Command::Message => {
            let Some(id) = frame.get("subscription").map(str::to_string) else {
                warn!("MESSAGE frame without subscription header");
                return Ok(());
            };
            match routes.get(&id) {
                Some(route) => {
                    if route.send(frame).is_err() {
                        debug!("Subscription {id} is no longer read");
                    }
                }
                None => debug!("MESSAGE for unknown subscription {id}"),
            }
            Ok(())
        }
        Command::Receipt => {
            debug!("Receipt {}", frame.get("receipt-id").unwrap_or("?"));
            Ok(())
        }
        Command::Error => {
            let reason = error_reason(&frame);
            error!("Error occured: {reason}");
            Err(reason)
        }
        other => {
            warn!("Unexpected STOMP {other} frame");
            Ok(())
        }
    }
}
