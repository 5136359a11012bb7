//! External collaborator seams
//!
//! - [`log_sink`]: append-only record storage
//! - [`alert_sink`]: user-visible alert delivery
//! - [`settings`]: persisted manual declaration and feature toggles
//!
//! Each seam has a file- or tracing-backed implementation used by the binary
//! and an in-memory implementation used by tests and embedders.

pub mod alert_sink;
pub mod log_sink;
pub mod settings;

pub use alert_sink::{Alert, AlertSink, MemoryAlertSink, TracingAlertSink};
pub use log_sink::{CsvFileLog, LogSink, MemoryLog};
pub use settings::{Feature, MemorySettingsStore, SettingsStore, TomlSettingsStore};
