//! Error types for envsense-engine
//!
//! Defines module-specific error types using thiserror for clear error propagation.
//! None of these are fatal to a running session: tick loops report them and
//! carry on with the next tick.

use thiserror::Error;

/// Main error type for envsense-engine
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors bubbled up from envsense-common
    #[error(transparent)]
    Common(#[from] envsense_common::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Log or alert sink rejected a write
    #[error("Sink error ({sink}): {reason}")]
    Sink { sink: String, reason: String },

    /// Settings store could not be read or written
    #[error("Settings error: {0}")]
    Settings(String),

    /// A producer (classifier, label source, activity source) failed
    #[error("Producer error ({producer}): {reason}")]
    Producer { producer: String, reason: String },

    /// A persisted log line could not be parsed back into a record
    #[error("Malformed record: {0}")]
    Record(String),

    /// Invalid argument (unknown stream, feature, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Shorthand for a producer failure
    pub fn producer(producer: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::Producer {
            producer: producer.into(),
            reason: reason.to_string(),
        }
    }

    /// Shorthand for a sink failure
    pub fn sink(sink: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::Sink {
            sink: sink.into(),
            reason: reason.to_string(),
        }
    }
}

/// Convenience Result type using envsense-engine Error
pub type Result<T> = std::result::Result<T, Error>;
