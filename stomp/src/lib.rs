//! STOMP 1.2 over WebSocket, optionally inside a SockJS session.
//!
//! # Architecture
//!
//! - **Connected by construction**: [`Session::connect`] returns only after
//!   CONNECTED arrives, so SUBSCRIBE and SEND can never precede CONNECT.
//! - **Two tasks per session**: a writer drains an outbound queue into the
//!   socket and a reader routes MESSAGE frames to subscriptions by id. An
//!   ERROR frame or a closed socket ends the session and every subscription.
//! - **Transport is a framing detail**: plain WebSocket carries one frame per
//!   text message. SockJS wraps frames in its own `o`/`h`/`a`/`c` framing on a
//!   per-session URL (see [`sockjs`]).
//!
//! # Modules
//!
//! - `frame`: frame encoding and decoding
//! - `sockjs`: SockJS framing and session URLs
//! - `transport`: mapping between frames and WebSocket messages
//! - `session`: connection lifecycle and subscriptions
//! - `chat`: the chat relay built on a session

pub mod chat;
pub mod frame;
pub mod session;
pub mod sockjs;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use chat::{ChatOptions, ChatRelay};
pub use frame::{Command, Frame};
pub use session::{Session, Subscription};
