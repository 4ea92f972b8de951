use crate::frame::Frame;
use crate::sockjs::{self, SockJsFrame};
use domain::error::Error;
use log::*;
use service::config::Transport;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

/// What one inbound WebSocket message amounted to.
#[derive(Debug, PartialEq)]
pub enum Inbound {
    /// STOMP frames, in arrival order.
    Frames(Vec<Frame>),
    /// SockJS session opened.
    Open,
    /// Heart-beats, pings and other traffic without frames.
    Idle,
    /// The peer closed the socket or the SockJS session.
    Closed(Option<String>),
}

/// The URL to open the WebSocket on.
pub fn target_url(transport: Transport, endpoint: &Url) -> Url {
    match transport {
        Transport::SockJs => sockjs::session_url(endpoint),
        Transport::WebSocket => endpoint.clone(),
    }
}

pub fn to_message(transport: Transport, frame: &Frame) -> Message {
    let text = frame.encode();
    match transport {
        Transport::SockJs => Message::Text(sockjs::encode(&[text]).into()),
        Transport::WebSocket => Message::Text(text.into()),
    }
}

pub fn from_message(transport: Transport, message: Message) -> Result<Inbound, Error> {
    let text = match message {
        Message::Text(text) => text.as_str().to_string(),
        Message::Binary(bytes) => String::from_utf8(bytes.to_vec())
            .map_err(|_| Error::protocol("Binary WebSocket message is not UTF-8"))?,
        Message::Close(close) => {
            return Ok(Inbound::Closed(close.map(|c| c.reason.as_str().to_string())))
        }
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => return Ok(Inbound::Idle),
    };

    let payloads = match transport {
        Transport::WebSocket => vec![text],
        Transport::SockJs => match text.parse::<SockJsFrame>()? {
            SockJsFrame::Open => return Ok(Inbound::Open),
            SockJsFrame::Heartbeat => return Ok(Inbound::Idle),
            SockJsFrame::Close { code, reason } => {
                debug!("SockJS session closed by server: {code} {reason}");
                return Ok(Inbound::Closed(Some(reason)));
            }
            SockJsFrame::Messages(messages) => messages,
        },
    };

    let mut frames = Vec::with_capacity(payloads.len());
    for payload in payloads {
        match Frame::decode(&payload) {
            Ok(Some(frame)) => frames.push(frame),
            Ok(None) => {}
            Err(e) => warn!("Skipping malformed STOMP frame: {e}"),
        }
    }

    if frames.is_empty() {
        Ok(Inbound::Idle)
    } else {
        Ok(Inbound::Frames(frames))
    }
}
