//! Error types for the `domain` layer.
use std::error::Error as StdError;
use std::fmt;

/// Top-level client error type.
/// Errors are modeled as a tree with `domain::error::Error` as the root, holding
/// an `error_kind` that says whether the failure is on our side (`Internal`) or
/// on the other end of a channel (`External`). The `source` field keeps the
/// original error. The channel crates (`sse`, `stomp`) translate their
/// transport errors into this type so the binary only deals with one error tree.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: DomainErrorKind,
}

/// Enum representing the major categories of errors that can occur in the client.
#[derive(Debug, PartialEq)]
pub enum DomainErrorKind {
    Internal(InternalErrorKind),
    External(ExternalErrorKind),
}

/// Enum representing the various kinds of internal errors.
#[derive(Debug, PartialEq)]
pub enum InternalErrorKind {
    Config,
    /// A payload did not have the expected shape.
    Decode,
    /// A display region was looked up by a selector nothing is registered under.
    MissingElement(String),
    /// A publish was attempted before the channel finished connecting.
    NotConnected,
    Other(String),
}

/// Enum representing the various kinds of external errors.
#[derive(Debug, PartialEq)]
pub enum ExternalErrorKind {
    Network,
    /// Nothing arrived on a channel within the allotted time.
    Timeout,
    /// The peer broke the channel's protocol (bad frame, STOMP `ERROR`, ...).
    Protocol(String),
    Other(String),
}

impl Error {
    pub fn internal(kind: InternalErrorKind) -> Self {
        Error {
            source: None,
            error_kind: DomainErrorKind::Internal(kind),
        }
    }

    pub fn external(kind: ExternalErrorKind) -> Self {
        Error {
            source: None,
            error_kind: DomainErrorKind::External(kind),
        }
    }

    /// A transport failure, keeping the underlying error as the source.
    pub fn network<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::External(ExternalErrorKind::Network),
        }
    }

    pub fn protocol(reason: impl Into<String>) -> Self {
        Self::external(ExternalErrorKind::Protocol(reason.into()))
    }

    pub fn missing_element(selector: &str) -> Self {
        Self::internal(InternalErrorKind::MissingElement(selector.to_string()))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "Client Error: {:?} ({source})", self.error_kind),
            None => write!(f, "Client Error: {:?}", self.error_kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        // Errors that result from issues building the reqwest::Client instance. This
        // type of error will occur prior to any network calls being made.
        let error_kind = if err.is_builder() {
            DomainErrorKind::Internal(InternalErrorKind::Other(
                "Failed to build reqwest client".to_string(),
            ))
        // The body arrived but was not the JSON we asked for.
        } else if err.is_decode() {
            DomainErrorKind::Internal(InternalErrorKind::Decode)
        // Errors that result from issues with the network call itself.
        } else {
            DomainErrorKind::External(ExternalErrorKind::Network)
        };

        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Decode),
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Config),
        }
    }
}
