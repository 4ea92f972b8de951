use clap::builder::TypedValueParser as _;
use clap::{ArgAction, Parser, Subcommand};
use dotenvy::dotenv;
use log::LevelFilter;
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Backend the client talks to when `BASE_URL` is not set.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Reconnect delay the employees stream advertises in its `retry:` field.
pub const DEFAULT_SSE_RECONNECT_DELAY_MS: u64 = 5_000;

/// How the chat relay carries STOMP frames over the WebSocket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transport {
    /// SockJS framing on top of the `/websocket` sub-path of the endpoint.
    SockJs,
    /// STOMP frames directly in WebSocket text messages.
    WebSocket,
}

#[derive(Debug, PartialEq, Eq)]
pub struct TransportParseError;

impl FromStr for Transport {
    type Err = TransportParseError;
    fn from_str(transport: &str) -> Result<Transport, Self::Err> {
        match transport.to_lowercase().as_str() {
            "sockjs" => Ok(Transport::SockJs),
            "websocket" => Ok(Transport::WebSocket),
            _ => Err(TransportParseError),
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Transport::SockJs => write!(f, "sockjs"),
            Transport::WebSocket => write!(f, "websocket"),
        }
    }
}

/// The channel to open once the client has started.
#[derive(Clone, Debug, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Fetch the employee list once and log the JSON body
    Fetch,
    /// Listen for employee-created notifications on the messages stream
    Listen,
    /// Follow the counter stream for a number of ticks
    Counter {
        /// Number of counter events to wait for before exiting
        #[arg(long, default_value_t = 10)]
        ticks: usize,

        /// Seconds to wait for each tick before giving up
        #[arg(long, default_value_t = 15)]
        tick_timeout_secs: u64,
    },
    /// Join the chat topic; every line read from stdin is published
    Chat,
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Base URL of the empapp backend. Relative paths below are resolved against it.
    #[arg(short, long, env, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Path (or absolute URL) of the employee list resource
    #[arg(long, env, default_value = "/api/employees")]
    employees_path: String,

    /// Path (or absolute URL) of the employee-created event stream
    #[arg(long, env, default_value = "api/employees/messages")]
    messages_path: String,

    /// Path (or absolute URL) of the counter event stream
    #[arg(long, env, default_value = "/api/counter")]
    counter_path: String,

    /// Path (or absolute URL) of the STOMP WebSocket endpoint
    #[arg(long, env, default_value = "/websocket-endpoint")]
    websocket_endpoint: String,

    /// Framing used on the chat WebSocket
    #[arg(
        long,
        env,
        default_value_t = Transport::SockJs,
        value_parser = clap::builder::PossibleValuesParser::new([
            "SOCKJS", "WEBSOCKET", "sockjs", "websocket"
        ])
            .map(|s| s.parse::<Transport>().unwrap()),
    )]
    pub transport: Transport,

    /// STOMP destination chat messages are published to
    #[arg(long, env, default_value = "/app/messages")]
    pub publish_destination: String,

    /// STOMP destination the chat relay subscribes to
    #[arg(long, env, default_value = "/topic/employees")]
    pub subscribe_destination: String,

    /// Let the event stream client reconnect after the connection drops
    #[arg(long, env, default_value_t = true, action = ArgAction::Set)]
    pub sse_reconnect: bool,

    /// Initial delay in milliseconds before the event stream client reconnects
    #[arg(long, env, default_value_t = DEFAULT_SSE_RECONNECT_DELAY_MS)]
    pub sse_reconnect_delay_ms: u64,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,

    #[command(subcommand)]
    pub command: Command,
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn set_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn employees_url(&self) -> Result<Url, url::ParseError> {
        self.resolve(&self.employees_path)
    }

    pub fn messages_url(&self) -> Result<Url, url::ParseError> {
        self.resolve(&self.messages_path)
    }

    pub fn counter_url(&self) -> Result<Url, url::ParseError> {
        self.resolve(&self.counter_path)
    }

    /// The WebSocket endpoint with its scheme switched to `ws`/`wss`.
    pub fn websocket_url(&self) -> Result<Url, url::ParseError> {
        let mut url = self.resolve(&self.websocket_endpoint)?;
        let scheme = match url.scheme() {
            "https" => "wss",
            "http" => "ws",
            other => other,
        }
        .to_string();
        // Only fails when switching between special and non-special schemes
        let _ = url.set_scheme(&scheme);
        Ok(url)
    }

    /// Joins `path` onto the base URL. Absolute URLs are returned unchanged,
    /// so both `api/employees/messages` and `http://host/api/employees/messages`
    /// are accepted.
    fn resolve(&self, path: &str) -> Result<Url, url::ParseError> {
        let mut base = Url::parse(&self.base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["empapp_client"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults_point_at_local_backend() {
        let config = parse(&["listen"]);

        assert_eq!(config.base_url(), DEFAULT_BASE_URL);
        assert_eq!(config.transport, Transport::SockJs);
        assert_eq!(config.publish_destination, "/app/messages");
        assert_eq!(config.subscribe_destination, "/topic/employees");
        assert!(config.sse_reconnect);
        assert_eq!(config.sse_reconnect_delay_ms, DEFAULT_SSE_RECONNECT_DELAY_MS);
        assert_eq!(config.command, Command::Listen);
    }

    #[test]
    fn test_relative_and_absolute_message_paths_resolve_to_same_url() {
        let relative = parse(&["--base-url", "http://localhost:8080", "listen"]);
        let absolute = parse(&[
            "--base-url",
            "http://other:9999",
            "--messages-path",
            "http://localhost:8080/api/employees/messages",
            "listen",
        ]);

        assert_eq!(
            relative.messages_url().unwrap(),
            absolute.messages_url().unwrap()
        );
        assert_eq!(
            relative.messages_url().unwrap().as_str(),
            "http://localhost:8080/api/employees/messages"
        );
    }

    #[test]
    fn test_base_url_with_path_prefix_is_kept() {
        let config = parse(&["--base-url", "http://localhost:8080/empapp", "fetch"]);

        assert_eq!(
            config.messages_url().unwrap().as_str(),
            "http://localhost:8080/empapp/api/employees/messages"
        );
        // A leading slash is rooted at the host, as in a browser
        assert_eq!(
            config.employees_url().unwrap().as_str(),
            "http://localhost:8080/api/employees"
        );
    }

    #[test]
    fn test_websocket_url_switches_scheme() {
        let plain = parse(&["chat"]);
        assert_eq!(
            plain.websocket_url().unwrap().as_str(),
            "ws://localhost:8080/websocket-endpoint"
        );

        let tls = parse(&["--base-url", "https://example.com", "chat"]);
        assert_eq!(
            tls.websocket_url().unwrap().as_str(),
            "wss://example.com/websocket-endpoint"
        );
    }

    #[test]
    fn test_transport_parsing() {
        assert_eq!("SockJS".parse::<Transport>(), Ok(Transport::SockJs));
        assert_eq!("websocket".parse::<Transport>(), Ok(Transport::WebSocket));
        assert_eq!("stomp".parse::<Transport>(), Err(TransportParseError));

        let config = parse(&["--transport", "websocket", "chat"]);
        assert_eq!(config.transport, Transport::WebSocket);
    }

    #[test]
    fn test_counter_subcommand_arguments() {
        let config = parse(&["counter", "--ticks", "3"]);
        assert_eq!(
            config.command,
            Command::Counter {
                ticks: 3,
                tick_timeout_secs: 15
            }
        );
    }

    #[test]
    fn test_sse_reconnect_can_be_disabled() {
        let config = parse(&["--sse-reconnect", "false", "listen"]);
        assert!(!config.sse_reconnect);
    }
}
