use crate::config::Config;
use log::LevelFilter;
use simplelog::{ConfigBuilder, TermLogger, TerminalMode};

/// Transport crates that log every request, event or frame. Hidden unless
/// the level is Trace.
const TRANSPORT_MODULES: &[&str] = &[
    "hyper",
    "hyper_util",
    "reqwest",
    "rustls",
    "eventsource_client",
    "tungstenite",
    "tokio_tungstenite",
];

/// What the terminal logger is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogSettings {
    pub level: LevelFilter,
    pub show_transport_logs: bool,
}

impl LogSettings {
    pub fn from_config(config: &Config) -> Self {
        Self::for_level(config.log_level_filter)
    }

    pub fn for_level(level: LevelFilter) -> Self {
        Self {
            level,
            show_transport_logs: level == LevelFilter::Trace,
        }
    }

    /// The modules this configuration silences.
    pub fn ignored_modules(&self) -> &'static [&'static str] {
        if self.show_transport_logs {
            &[]
        } else {
            TRANSPORT_MODULES
        }
    }

    fn build(&self) -> simplelog::Config {
        let mut builder = ConfigBuilder::new();
        builder
            .set_time_format_rfc3339()
            .set_target_level(LevelFilter::Error);
        for module in self.ignored_modules() {
            builder.add_filter_ignore_str(module);
        }
        builder.build()
    }
}

pub struct Logger {}

impl Logger {
    /// Installs the global terminal logger. Errors go to stderr, everything
    /// else to stdout.
    pub fn init_logger(config: &Config) {
        let settings = LogSettings::from_config(config);

        TermLogger::init(
            settings.level,
            settings.build(),
            TerminalMode::Mixed,
            simplelog::ColorChoice::Auto,
        )
        .unwrap_or_else(|e| eprintln!("Logger already initialized: {e}"));
    }
}
