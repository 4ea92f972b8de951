//! SockJS framing for the raw WebSocket transport.
//!
//! The server prefixes every WebSocket text message with a frame type:
//! `o` open, `h` heart-beat, `a` followed by a JSON array of messages, and
//! `c` followed by `[code, "reason"]`. The client sends a JSON array of
//! message strings.

use domain::error::Error;
use rand::Rng;
use std::str::FromStr;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SockJsFrame {
    Open,
    Heartbeat,
    Messages(Vec<String>),
    Close { code: u16, reason: String },
}

impl FromStr for SockJsFrame {
    type Err = Error;
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut chars = text.chars();
        let kind = chars
            .next()
            .ok_or_else(|| Error::protocol("Empty SockJS frame"))?;
        let payload = chars.as_str();

        match kind {
            'o' => Ok(SockJsFrame::Open),
            'h' => Ok(SockJsFrame::Heartbeat),
            'a' => Ok(SockJsFrame::Messages(serde_json::from_str(payload)?)),
            'c' => {
                let (code, reason): (u16, String) = serde_json::from_str(payload)?;
                Ok(SockJsFrame::Close { code, reason })
            }
            other => Err(Error::protocol(format!("Unknown SockJS frame type '{other}'"))),
        }
    }
}

/// Wraps outbound messages in the array frame SockJS servers expect.
pub fn encode(messages: &[String]) -> String {
    // A slice of Strings always serializes
    serde_json::to_string(messages).unwrap_or_else(|_| "[]".to_string())
}

/// The raw WebSocket URL of a new SockJS session under `endpoint`:
/// `<endpoint>/<server-id>/<session-id>/websocket`.
pub fn session_url(endpoint: &Url) -> Url {
    let server_id = rand::thread_rng().gen_range(0..1000);
    let session_id = uuid::Uuid::new_v4().simple().to_string();

    let mut url = endpoint.clone();
    let path = format!(
        "{}/{:03}/{}/websocket",
        endpoint.path().trim_end_matches('/'),
        server_id,
        session_id
    );
    url.set_path(&path);
    url
}
