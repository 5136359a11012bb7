//! Event types for the EnvSense event system
//!
//! Provides shared event definitions and the EventBus used to report engine
//! activity and failures to observers (CLI output, UI bridges, tests).

mod environment_types;

pub use environment_types::{AlertKind, EnvironmentCategory, LogStream, Severity};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// EnvSense event types
///
/// Events are broadcast via EventBus and can be serialized for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EnvEvent {
    /// A visual observation produced a new automatic category
    CategoryUpdated {
        category: EnvironmentCategory,
        confidence: f32,
        timestamp: DateTime<Utc>,
    },

    /// The user-declared environment changed
    ManualChanged {
        /// Raw selection as entered (None when cleared)
        raw_name: Option<String>,
        /// Recognised category (None when the name is not recognised)
        category: Option<EnvironmentCategory>,
        timestamp: DateTime<Utc>,
    },

    /// The mismatch tracker raised an alert
    ///
    /// `episode` identifies the disagreement episode; together with `kind` it
    /// forms the alert identity.
    AlertRaised {
        episode: u64,
        kind: AlertKind,
        title: String,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// A record was appended to a log stream
    RecordLogged {
        stream: LogStream,
        timestamp: DateTime<Utc>,
    },

    /// A log or alert sink failed; the tick that produced it was dropped
    SinkFailed {
        /// Sink name ("log:combined", "alert", ...)
        sink: String,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// A producer task failed; its stream now holds an error placeholder
    ProducerFailed {
        producer: String,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// The owning session finished teardown
    SessionStopped { timestamp: DateTime<Utc> },
}

/// Broadcast bus for [`EnvEvent`]s
///
/// Lossy by nature: slow subscribers see `RecvError::Lagged` and older
/// events are dropped once `capacity` is exceeded.
pub struct EventBus {
    tx: broadcast::Sender<EnvEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use envsense_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<EnvEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: EnvEvent) -> Result<usize, broadcast::error::SendError<EnvEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: EnvEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers_errors() {
        let bus = EventBus::new(10);
        let result = bus.emit(EnvEvent::SessionStopped { timestamp: Utc::now() });
        assert!(result.is_err());
        // Lossy variant never panics
        bus.emit_lossy(EnvEvent::SessionStopped { timestamp: Utc::now() });
    }

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.emit(EnvEvent::RecordLogged {
            stream: LogStream::Combined,
            timestamp: Utc::now(),
        })
        .unwrap();

        match rx.recv().await.unwrap() {
            EnvEvent::RecordLogged { stream, .. } => assert_eq!(stream, LogStream::Combined),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = EnvEvent::AlertRaised {
            episode: 3,
            kind: AlertKind::LongMismatch,
            title: "Environment mismatch".to_string(),
            message: "m".to_string(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "AlertRaised");
        assert_eq!(json["kind"], "long_mismatch");
        assert_eq!(json["episode"], 3);
    }
}
