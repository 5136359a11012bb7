//! Test helpers for envsense-engine integration tests
//!
//! Provides:
//! - Harness: engine wired to in-memory sinks and a manual clock
//! - Fake producers with scripted outputs and failure injection

#![allow(dead_code)]

pub mod fake_producers;

pub use fake_producers::{FakeActivitySource, FakeAudioClassifier, FakeLabelSource};

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use envsense_common::events::{EnvEvent, EventBus};
use envsense_engine::categorizer::LabelCandidate;
use envsense_engine::clock::{Clock, ManualClock};
use envsense_engine::config::EngineConfig;
use envsense_engine::sinks::{MemoryAlertSink, MemoryLog, MemorySettingsStore};
use envsense_engine::{EngineDeps, FusionEngine, SharedState};
use tokio::sync::broadcast;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
}

pub fn labels(items: &[(&str, f32)]) -> Vec<LabelCandidate> {
    items.iter().map(|(t, s)| LabelCandidate::new(*t, *s)).collect()
}

/// Engine plus handles to every collaborator
pub struct Harness {
    pub engine: Arc<FusionEngine>,
    pub clock: Arc<ManualClock>,
    pub log: Arc<MemoryLog>,
    pub alerts: Arc<MemoryAlertSink>,
    pub settings: Arc<MemorySettingsStore>,
    pub events: Arc<EventBus>,
    pub rx: broadcast::Receiver<EnvEvent>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_clock(config, Arc::new(ManualClock::new(t0())))
    }

    pub fn with_clock(config: EngineConfig, clock: Arc<ManualClock>) -> Self {
        let log = Arc::new(MemoryLog::new());
        let alerts = Arc::new(MemoryAlertSink::new());
        let settings = Arc::new(MemorySettingsStore::new());
        let events = Arc::new(EventBus::new(1000));
        let rx = events.subscribe();

        let engine = Arc::new(FusionEngine::new(
            config,
            EngineDeps {
                state: Arc::new(SharedState::new()),
                log: log.clone(),
                alerts: alerts.clone(),
                settings: settings.clone(),
                events: events.clone(),
                clock: clock.clone() as Arc<dyn Clock>,
            },
        ));

        Self {
            engine,
            clock,
            log,
            alerts,
            settings,
            events,
            rx,
        }
    }

    /// Events received so far
    pub fn drain_events(&mut self) -> Vec<EnvEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            out.push(event);
        }
        out
    }
}
