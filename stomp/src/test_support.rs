//! In-process STOMP broker for session and relay tests.
//!
//! Accepts one WebSocket connection, records every client frame, answers
//! CONNECT and echoes SEND bodies upper-cased to the subscribed topic. Tests
//! can also push topic messages, whole frames or raw text to the client.

use crate::frame::{Command, Frame};
use crate::sockjs;
use events::ChatText;
use futures_util::{SinkExt, StreamExt};
use service::config::Transport;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

#[derive(Debug, Clone, Copy)]
pub(crate) enum ConnectReply {
    Accept,
    Reject(&'static str),
}

enum Push {
    /// A body for the subscribed topic, held until there is a subscription.
    Topic(String),
    /// Encoded STOMP text, sent as is inside the transport's framing.
    Raw(String),
}

pub(crate) struct Broker {
    pub endpoint: Url,
    frames: Arc<Mutex<Vec<Frame>>>,
    push: mpsc::UnboundedSender<Push>,
}

impl Broker {
    pub async fn start(transport: Transport, reply: ConnectReply) -> Broker {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let frames = Arc::new(Mutex::new(Vec::new()));
        let (push, mut push_rx) = mpsc::unbounded_channel::<Push>();

        let recorded = frames.clone();
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let socket = tokio_tungstenite::accept_async(tcp).await.unwrap();
            let (mut sink, mut stream) = socket.split();

            if transport == Transport::SockJs {
                sink.send(Message::Text("o".into())).await.unwrap();
            }

            // (id, destination) of the one subscription this broker serves
            let mut subscription: Option<(String, String)> = None;
            let mut pending: Vec<String> = Vec::new();
            let mut message_id = 0;

            loop {
                // Encoded frames to send, in order
                let mut replies: Vec<String> = Vec::new();
                tokio::select! {
                    inbound = stream.next() => {
                        let Some(Ok(message)) = inbound else { break };
                        for frame in client_frames(transport, message) {
                            recorded.lock().unwrap().push(frame.clone());
                            match frame.command {
                                Command::Connect => {
                                    let answer = match reply {
                                        ConnectReply::Accept => Frame::new(Command::Connected)
                                            .header("version", "1.2")
                                            .header("heart-beat", "0,0"),
                                        ConnectReply::Reject(reason) => {
                                            Frame::new(Command::Error).header("message", reason)
                                        }
                                    };
                                    replies.push(answer.encode());
                                }
                                Command::Subscribe => {
                                    subscription = Some((
                                        frame.get("id").unwrap_or_default().to_string(),
                                        frame.get("destination").unwrap_or_default().to_string(),
                                    ));
                                }
                                Command::Send => {
                                    if let Ok(message) = frame.body.parse::<ChatText>() {
                                        pending.push(
                                            ChatText::new(message.text.to_uppercase()).to_json(),
                                        );
                                    }
                                }
                                Command::Disconnect => return,
                                _ => {}
                            }
                        }
                    }
                    Some(push) = push_rx.recv() => match push {
                        Push::Topic(body) => pending.push(body),
                        Push::Raw(text) => replies.push(text),
                    },
                }

                if let Some((id, destination)) = &subscription {
                    for body in pending.drain(..) {
                        message_id += 1;
                        replies.push(
                            Frame::new(Command::Message)
                                .header("destination", destination)
                                .header("subscription", id)
                                .header("message-id", &message_id.to_string())
                                .header("content-type", "application/json")
                                .body(body)
                                .encode(),
                        );
                    }
                }

                for text in replies {
                    if sink.send(server_message(transport, text)).await.is_err() {
                        return;
                    }
                }
            }
        });

        Broker {
            endpoint: Url::parse(&format!("ws://{addr}/websocket-endpoint")).unwrap(),
            frames,
            push,
        }
    }

    /// Every frame the client has sent so far.
    pub fn frames(&self) -> Vec<Frame> {
        self.frames.lock().unwrap().clone()
    }

    /// Delivers `body` to the subscribed topic, once there is a subscription.
    pub fn push(&self, body: &str) {
        self.push.send(Push::Topic(body.to_string())).unwrap();
    }

    /// Sends `frame` to the client right away.
    pub fn push_frame(&self, frame: Frame) {
        self.push.send(Push::Raw(frame.encode())).unwrap();
    }

    /// Sends `text` to the client right away, whether or not it is a valid frame.
    pub fn push_raw(&self, text: &str) {
        self.push.send(Push::Raw(text.to_string())).unwrap();
    }
}

fn client_frames(transport: Transport, message: Message) -> Vec<Frame> {
    let Message::Text(text) = message else {
        return Vec::new();
    };
    let payloads = match transport {
        Transport::WebSocket => vec![text.as_str().to_string()],
        Transport::SockJs => serde_json::from_str::<Vec<String>>(text.as_str()).unwrap(),
    };
    payloads
        .iter()
        .filter_map(|payload| Frame::decode(payload).unwrap())
        .collect()
}

fn server_message(transport: Transport, text: String) -> Message {
    match transport {
        Transport::WebSocket => Message::Text(text.into()),
        Transport::SockJs => Message::Text(format!("a{}", sockjs::encode(&[text])).into()),
    }
}

/// Polls `check` until it holds, failing the test after two seconds.
pub(crate) async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("Condition not met within two seconds");
}
