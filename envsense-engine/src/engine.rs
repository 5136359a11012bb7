//! Fusion engine
//!
//! Owns the tracker and samplers and connects them to the shared state and
//! the external sinks. Producers call the `ingest_*` methods; the session's
//! sampler loop calls [`FusionEngine::sample_tick`].
//!
//! No method here fails because a sink failed: sink errors are logged,
//! broadcast as [`EnvEvent::SinkFailed`] and the tick carries on. Log appends
//! and settings writes run on the blocking pool.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use envsense_common::events::{EnvEvent, EnvironmentCategory, EventBus, LogStream};
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

use crate::categorizer::{self, CategorizedObservation, LabelCandidate};
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::mismatch::{AutoReading, Evaluation, MismatchState, MismatchTracker};
use crate::record::{AutomaticRecord, FusionRecord, LogRecord, ManualRecord};
use crate::sampler::StreamSampler;
use crate::sinks::{Alert, AlertSink, Feature, LogSink, SettingsStore};
use crate::state::{top_k_audio, ActivityReading, AudioLabel, Latest, ManualDeclaration, SharedState, Snapshot, StreamId};

/// Collaborators injected into the engine
pub struct EngineDeps {
    pub state: Arc<SharedState>,
    pub log: Arc<dyn LogSink>,
    pub alerts: Arc<dyn AlertSink>,
    pub settings: Arc<dyn SettingsStore>,
    pub events: Arc<EventBus>,
    pub clock: Arc<dyn Clock>,
}

pub struct FusionEngine {
    config: EngineConfig,
    state: Arc<SharedState>,
    log: Arc<dyn LogSink>,
    alerts: Arc<dyn AlertSink>,
    settings: Arc<dyn SettingsStore>,
    events: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    tracker: Mutex<MismatchTracker>,
    sampler: Mutex<StreamSampler>,
}

impl FusionEngine {
    pub fn new(config: EngineConfig, deps: EngineDeps) -> Self {
        let tracker = MismatchTracker::new(config.mismatch_threshold_ms);
        let sampler = StreamSampler::new(&config.log_intervals);
        Self {
            config,
            state: deps.state,
            log: deps.log,
            alerts: deps.alerts,
            settings: deps.settings,
            events: deps.events,
            clock: deps.clock,
            tracker: Mutex::new(tracker),
            sampler: Mutex::new(sampler),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn log_sink(&self) -> &Arc<dyn LogSink> {
        &self.log
    }

    pub fn settings(&self) -> &Arc<dyn SettingsStore> {
        &self.settings
    }

    pub async fn mismatch_state(&self) -> MismatchState {
        self.tracker.lock().await.state()
    }

    // -----------------------------------------------------------------------
    // Producer entry points
    // -----------------------------------------------------------------------

    /// Categorize a visual label snapshot, publish it and run the tracker
    pub async fn ingest_visual_labels(&self, labels: &[LabelCandidate]) -> CategorizedObservation {
        let now = self.clock.now();
        let observation = categorizer::observe(labels, now);
        trace!(
            "Visual labels ({}) → {} ({:.2})",
            labels.len(),
            observation.category,
            observation.confidence
        );

        self.state.publish_camera(observation).await;
        self.events.emit_lossy(EnvEvent::CategoryUpdated {
            category: observation.category,
            confidence: observation.confidence,
            timestamp: now,
        });

        let reading = self.automatic_reading(observation.category).await;
        self.evaluate_mismatch(reading).await;
        observation
    }

    /// Publish a ranked audio classification (kept to the configured top-k)
    pub async fn ingest_audio(&self, labels: Vec<AudioLabel>) {
        let top = top_k_audio(labels, self.config.audio_top_k);
        trace!("Audio top-{}: {:?}", self.config.audio_top_k, top);
        self.state.publish_audio(top, self.clock.now()).await;
    }

    pub async fn ingest_activity(&self, reading: ActivityReading) {
        trace!("Activity: {} ({:.2})", reading.label, reading.confidence);
        self.state.publish_activity(reading, self.clock.now()).await;
    }

    /// Record a producer failure as an error placeholder on its stream
    pub async fn report_producer_failure(&self, stream: StreamId, error: &Error) {
        warn!("Producer {} failed: {}", stream.as_str(), error);
        self.state.mark_failed(stream, error.to_string()).await;
        self.events.emit_lossy(EnvEvent::ProducerFailed {
            producer: stream.as_str().to_string(),
            error: error.to_string(),
            timestamp: self.clock.now(),
        });
    }

    // -----------------------------------------------------------------------
    // Manual declaration
    // -----------------------------------------------------------------------

    /// Apply and persist a manual selection (None clears it)
    ///
    /// The in-memory declaration is updated even when persisting fails.
    pub async fn set_manual(&self, raw_name: Option<&str>) -> ManualDeclaration {
        let declaration = ManualDeclaration::from_raw_name(raw_name);
        self.state.set_manual(declaration.clone()).await;
        info!(
            "Manual environment set to {:?} ({:?})",
            declaration.raw_name, declaration.category
        );

        let settings = self.settings.clone();
        let raw_name = declaration.raw_name.clone();
        let persisted = tokio::task::spawn_blocking(move || settings.set_manual_selection(raw_name.as_deref()))
            .await
            .unwrap_or_else(|e| Err(Error::sink("settings", e)));
        if let Err(e) = persisted {
            self.report_sink_failure("settings", &e);
        }

        self.events.emit_lossy(EnvEvent::ManualChanged {
            raw_name: declaration.raw_name.clone(),
            category: declaration.category,
            timestamp: self.clock.now(),
        });
        declaration
    }

    /// Load the persisted manual selection into the shared state
    pub async fn restore_manual(&self) -> ManualDeclaration {
        let declaration = ManualDeclaration::from_raw_name(self.settings.manual_selection().as_deref());
        debug!("Restored manual environment {:?}", declaration.raw_name);
        self.state.set_manual(declaration.clone()).await;
        declaration
    }

    // -----------------------------------------------------------------------
    // Mismatch tracking
    // -----------------------------------------------------------------------

    /// In-vehicle activity overrides the visual category
    async fn automatic_reading(&self, category: EnvironmentCategory) -> AutoReading {
        match self.state.activity().await {
            Latest::Value(activity) if activity.is_in_vehicle() => AutoReading::InVehicle,
            _ => AutoReading::Category(category),
        }
    }

    /// Run the tracker for one automatic reading and deliver any alert
    pub async fn evaluate_mismatch(&self, reading: AutoReading) -> Evaluation {
        let now = self.clock.now();
        let manual = self.state.manual().await.category;

        let evaluation = {
            let mut tracker = self.tracker.lock().await;
            if !self.settings.feature_enabled(Feature::MismatchAlerts) {
                tracker.reset();
                return Evaluation {
                    alert: None,
                    state_after: tracker.state(),
                };
            }
            tracker.evaluate(reading, manual, now)
        };

        if let Some(id) = evaluation.alert {
            let alert = Alert::for_mismatch(
                id,
                reading.coerced(),
                manual.unwrap_or_default(),
                self.config.mismatch_threshold_ms,
            );
            self.events.emit_lossy(EnvEvent::AlertRaised {
                episode: id.episode,
                kind: id.kind,
                title: alert.title.clone(),
                message: alert.message.clone(),
                timestamp: now,
            });
            if let Err(e) = self.alerts.deliver(&alert).await {
                self.report_sink_failure("alert", &e);
            }
        }

        evaluation
    }

    // -----------------------------------------------------------------------
    // Sampling
    // -----------------------------------------------------------------------

    fn stream_enabled(&self, stream: LogStream) -> bool {
        let ai = self.settings.feature_enabled(Feature::AiLogging);
        let manual = self.settings.feature_enabled(Feature::ManualLogging);
        match stream {
            LogStream::Automatic => ai,
            LogStream::Manual => manual,
            LogStream::Combined => ai || manual,
        }
    }

    /// One sampler tick: write every enabled stream whose limiter permits
    ///
    /// Returns the streams that were written successfully.
    pub async fn sample_tick(&self) -> Vec<LogStream> {
        let now = self.clock.now();

        let due: Vec<LogStream> = {
            let mut sampler = self.sampler.lock().await;
            LogStream::ALL
                .into_iter()
                .filter(|stream| self.stream_enabled(*stream))
                .filter(|stream| sampler.tick(*stream, now))
                .collect()
        };
        if due.is_empty() {
            return Vec::new();
        }

        let snapshot = self.state.snapshot().await;
        let rows: Vec<Row> = due
            .into_iter()
            .map(|stream| encode_row(stream, &snapshot, now))
            .collect();

        let log = self.log.clone();
        let outcomes = match tokio::task::spawn_blocking(move || {
            rows.into_iter()
                .map(|(stream, header, line)| (stream, log.append(stream, &header, &line)))
                .collect::<Vec<_>>()
        })
        .await
        {
            Ok(outcomes) => outcomes,
            Err(e) => {
                self.report_sink_failure("log", &Error::sink("log", e));
                return Vec::new();
            }
        };

        let mut written = Vec::with_capacity(outcomes.len());
        for (stream, outcome) in outcomes {
            match outcome {
                Ok(()) => {
                    debug!("Logged {} record", stream);
                    self.events.emit_lossy(EnvEvent::RecordLogged {
                        stream,
                        timestamp: now,
                    });
                    written.push(stream);
                }
                Err(e) => self.report_sink_failure(&format!("log:{}", stream), &e),
            }
        }
        written
    }

    /// Read back a stream's lines (header excluded)
    pub fn read_back(&self, stream: LogStream) -> Result<Vec<String>> {
        self.log.read_back(stream)
    }

    pub fn clear_log(&self, stream: LogStream) -> Result<()> {
        self.log.clear(stream)
    }

    /// Discard tracker and sampler state (session teardown)
    pub async fn reset(&self) {
        self.tracker.lock().await.reset();
        self.sampler.lock().await.reset();
    }

    fn report_sink_failure(&self, sink: &str, error: &Error) {
        warn!("Sink {} failed: {}", sink, error);
        self.events.emit_lossy(EnvEvent::SinkFailed {
            sink: sink.to_string(),
            error: error.to_string(),
            timestamp: self.clock.now(),
        });
    }
}

/// Stream, header and encoded line of one pending write
type Row = (LogStream, Vec<&'static str>, String);

fn encode_row(stream: LogStream, snapshot: &Snapshot, now: DateTime<Utc>) -> Row {
    match stream {
        LogStream::Automatic => row(&AutomaticRecord::from_snapshot(snapshot, now)),
        LogStream::Manual => row(&ManualRecord::from_snapshot(snapshot, now)),
        LogStream::Combined => row(&FusionRecord::from_snapshot(snapshot, now)),
    }
}

fn row<R: LogRecord>(record: &R) -> Row {
    (R::STREAM, R::header(), record.to_line())
}
