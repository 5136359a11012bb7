//! Common error types for EnvSense

use thiserror::Error;

/// Common result type for EnvSense operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared across EnvSense crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML document could not be parsed
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML document could not be serialized
    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
