use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TailpoolError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("No jobs found in {0}. Run `tailpool init` and add items first.")]
    NoJobs(String),

    #[error("Invalid item pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        source: regex::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Per-job failure. Contained at the dispatcher boundary and recorded as a
/// failed outcome; it never aborts a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    #[error("handler failed: {0}")]
    Failed(String),

    #[error("handler timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}
