//! Logging setup: a global tracing subscriber writing to stderr so stdout
//! stays free for statistics and reports.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// Failed to set the global tracing subscriber.
    #[error("Failed to install global tracing subscriber: {0}")]
    SetGlobal(#[from] tracing_subscriber::util::TryInitError),
}

/// `RUST_LOG` wins when set; otherwise `info`, or `debug` with `verbose`.
pub fn init(verbose: bool) -> Result<(), LoggingError> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(verbose))
        .try_init()?;
    Ok(())
}
