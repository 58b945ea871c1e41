//! Subscriber setup for the `tracing` events emitted by the runtime.

use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::config::LoggingConfig;

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("unknown log format '{0}' (expected compact, pretty or json)")]
    UnknownFormat(String),
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Installs a global subscriber writing to stderr.
///
/// `RUST_LOG` wins over `config.level`; an invalid level falls back to
/// `warn`. Calling this twice returns [`LoggingError::AlreadyInitialized`].
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| {
            eprintln!("warning: invalid log level '{}', using 'warn'", config.level);
            EnvFilter::new("warn")
        });
    let registry = Registry::default().with(filter);

    let layer = match config.format.to_ascii_lowercase().as_str() {
        "json" => fmt::layer()
            .with_writer(std::io::stderr)
            .json()
            .with_target(true)
            .with_current_span(false)
            .boxed(),
        "pretty" => fmt::layer()
            .with_writer(std::io::stderr)
            .pretty()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        "compact" => fmt::layer()
            .with_writer(std::io::stderr)
            .compact()
            .with_target(true)
            .boxed(),
        other => return Err(LoggingError::UnknownFormat(other.to_string())),
    };

    registry
        .with(layer)
        .try_init()
        .map_err(|err| LoggingError::AlreadyInitialized(err.to_string()))?;

    tracing::debug!(level = %config.level, format = %config.format, "logging initialized");
    Ok(())
}
