//! Alert delivery

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use envsense_common::events::{AlertKind, EnvironmentCategory, Severity};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::mismatch::AlertId;

/// A user-facing alert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub id: AlertId,
    pub title: String,
    pub message: String,
    pub severity: Severity,
}

impl Alert {
    /// Build the alert text for a tracker signal
    pub fn for_mismatch(
        id: AlertId,
        automatic: EnvironmentCategory,
        manual: EnvironmentCategory,
        threshold_ms: u64,
    ) -> Self {
        let (title, message) = match id.kind {
            AlertKind::LongMismatch => (
                "Environment mismatch".to_string(),
                format!(
                    "Detected {} but you selected {} for more than {} seconds.",
                    automatic,
                    manual,
                    threshold_ms / 1000
                ),
            ),
            AlertKind::MismatchResolved => (
                "Environment mismatch resolved".to_string(),
                format!("Detected environment matches your selection again ({}).", manual),
            ),
        };
        Self {
            id,
            title,
            message,
            severity: id.kind.severity(),
        }
    }
}

/// User-visible alert delivery (notification, haptics, ...)
///
/// Delivery failures are returned to the caller, which reports them and does
/// not retry.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn deliver(&self, alert: &Alert) -> Result<()>;
}

/// Writes alerts to the tracing output
#[derive(Debug, Default)]
pub struct TracingAlertSink;

#[async_trait]
impl AlertSink for TracingAlertSink {
    async fn deliver(&self, alert: &Alert) -> Result<()> {
        match alert.severity {
            Severity::Warning => warn!("[{}] {}: {}", alert.id, alert.title, alert.message),
            Severity::Info => info!("[{}] {}: {}", alert.id, alert.title, alert.message),
        }
        Ok(())
    }
}

/// Collects delivered alerts; can be told to fail
#[derive(Debug, Default)]
pub struct MemoryAlertSink {
    delivered: Mutex<Vec<Alert>>,
    fail: AtomicBool,
}

impl MemoryAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn delivered(&self) -> Vec<Alert> {
        self.delivered.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl AlertSink for MemoryAlertSink {
    async fn deliver(&self, alert: &Alert) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::sink("alert", "injected delivery failure"));
        }
        self.delivered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(alert.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_mismatch_text() {
        let id = AlertId {
            episode: 2,
            kind: AlertKind::LongMismatch,
        };
        let alert = Alert::for_mismatch(id, EnvironmentCategory::Outside, EnvironmentCategory::Inside, 30_000);
        assert_eq!(alert.title, "Environment mismatch");
        assert!(alert.message.contains("Detected Outside but you selected Inside"));
        assert!(alert.message.contains("30 seconds"));
        assert_eq!(alert.severity, Severity::Warning);
    }

    #[test]
    fn test_resolved_is_info() {
        let id = AlertId {
            episode: 2,
            kind: AlertKind::MismatchResolved,
        };
        let alert = Alert::for_mismatch(id, EnvironmentCategory::Inside, EnvironmentCategory::Inside, 30_000);
        assert_eq!(alert.severity, Severity::Info);
    }

    #[tokio::test]
    async fn test_memory_sink_collects_and_fails() {
        let sink = MemoryAlertSink::new();
        let alert = Alert::for_mismatch(
            AlertId {
                episode: 1,
                kind: AlertKind::LongMismatch,
            },
            EnvironmentCategory::Outside,
            EnvironmentCategory::Inside,
            30_000,
        );
        sink.deliver(&alert).await.unwrap();
        sink.set_fail(true);
        assert!(sink.deliver(&alert).await.is_err());
        assert_eq!(sink.delivered(), vec![alert]);
    }
}
