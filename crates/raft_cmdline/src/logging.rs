use std::io::{self, IsTerminal};

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};

/// Environment variable overriding `logging.filter`.
pub const LOG_ENV: &str = "RAFT_LOG";

const DEFAULT_FILTER: &str = "info";

/// Picks the filter directive: `RAFT_LOG`, then the config file, then `info`.
pub fn filter_directive(env_value: Option<String>, config: &LoggingConfig) -> String {
    env_value
        .filter(|value| !value.trim().is_empty())
        .or_else(|| config.filter.clone())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

/// Installs the global subscriber. Logs always go to stderr; stdout is left
/// to the program's own output.
pub fn init(config: &LoggingConfig) {
    let directive = filter_directive(std::env::var(LOG_ENV).ok(), config);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|err| {
        eprintln!("ignoring invalid log filter `{directive}`: {err}");
        EnvFilter::new(DEFAULT_FILTER)
    });

    let builder = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(filter)
        .with_ansi(io::stderr().is_terminal())
        .with_target(false);

    let installed = match config.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder
            .json()
            // Keeps the message and fields at the top level of each line.
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false)
            .try_init(),
    };
    if let Err(err) = installed {
        eprintln!("logging already initialized: {err}");
    }
}
