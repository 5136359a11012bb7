//! Environment-related type definitions
//!
//! Supporting types shared by the engine, its sinks and event subscribers.

use serde::{Deserialize, Serialize};

/// Binary environment judgment plus the "not comparable" state
///
/// Equality is by variant only; the label text that produced a category is
/// never carried along.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "PascalCase")]
pub enum EnvironmentCategory {
    /// Enclosed space (rooms, vehicles)
    Inside,
    /// Open air
    Outside,
    /// No usable evidence
    #[default]
    Unknown,
}

impl EnvironmentCategory {
    /// Canonical name used in log lines and settings
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvironmentCategory::Inside => "Inside",
            EnvironmentCategory::Outside => "Outside",
            EnvironmentCategory::Unknown => "Unknown",
        }
    }

    /// Parse a canonical name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "inside" => Some(EnvironmentCategory::Inside),
            "outside" => Some(EnvironmentCategory::Outside),
            "unknown" => Some(EnvironmentCategory::Unknown),
            _ => None,
        }
    }
}

impl std::fmt::Display for EnvironmentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of mismatch alert raised by the tracker
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Automatic and manual categories disagreed past the threshold
    LongMismatch,
    /// A previously alerted disagreement has ended
    MismatchResolved,
}

impl AlertKind {
    /// Severity used when delivering this alert
    pub fn severity(&self) -> Severity {
        match self {
            AlertKind::LongMismatch => Severity::Warning,
            AlertKind::MismatchResolved => Severity::Info,
        }
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertKind::LongMismatch => write!(f, "long_mismatch"),
            AlertKind::MismatchResolved => write!(f, "mismatch_resolved"),
        }
    }
}

/// Alert delivery severity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
}

/// Independent persisted log destinations
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LogStream {
    /// Automatic category only
    Automatic,
    /// Manual declaration and activity
    Manual,
    /// Full fusion record
    Combined,
}

impl LogStream {
    /// All streams in a stable order
    pub const ALL: [LogStream; 3] = [LogStream::Automatic, LogStream::Manual, LogStream::Combined];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogStream::Automatic => "automatic",
            LogStream::Manual => "manual",
            LogStream::Combined => "combined",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "automatic" | "auto" | "ai" => Some(LogStream::Automatic),
            "manual" => Some(LogStream::Manual),
            "combined" => Some(LogStream::Combined),
            _ => None,
        }
    }
}

impl std::fmt::Display for LogStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
