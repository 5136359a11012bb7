//! # EnvSense Common Library
//!
//! Shared code for the EnvSense workspace including:
//! - Error types
//! - Event types (EnvEvent enum) and the EventBus
//! - Configuration file resolution and atomic TOML writes
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
pub use events::{AlertKind, EnvironmentCategory, EventBus, EnvEvent, Severity};
