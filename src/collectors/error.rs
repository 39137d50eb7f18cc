use std::io;
use thiserror::Error;

/// Errors raised while building, running or exposing collectors.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// External command could not be spawned, exited non-zero or timed out.
    #[error("error while calling '{command}': {source}")]
    ExecutionFailed {
        command: String,
        #[source]
        source: io::Error,
    },

    /// The whole output batch of a command could not be decoded.
    #[error("couldn't decode {format} output: {reason}")]
    DecodeFailed { format: &'static str, reason: String },

    /// A filter referenced a collector that was never registered.
    #[error("missing collector: {0}")]
    UnknownCollector(String),

    /// Two registrations share a name.
    #[error("collector '{0}' registered more than once")]
    DuplicateCollector(&'static str),

    /// Collector names are lowercase ASCII, digits and underscores.
    #[error("invalid collector name '{0}'")]
    InvalidCollectorName(&'static str),

    /// A sample did not supply one value per declared label.
    #[error("inconsistent label cardinality for {metric}: expected {expected} label values, got {got}")]
    LabelCardinality {
        metric: String,
        expected: usize,
        got: usize,
    },

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl CollectorError {
    pub(crate) fn decode(format: &'static str, reason: impl ToString) -> Self {
        Self::DecodeFailed {
            format,
            reason: reason.to_string(),
        }
    }
}
