//! Session lifecycle
//!
//! A session owns the periodic tasks:
//! - sampler loop (`sample_interval_ms`): rate-limited log writes
//! - camera loop (`camera_interval_ms`): label source → categorizer → tracker
//! - audio loop (`audio_interval_ms`): audio classifier → shared state
//! - activity loop (`activity_interval_ms`): activity source → shared state
//!
//! Every loop waits on its interval or the cancellation token, whichever
//! comes first, so teardown never waits for a full period or a stuck
//! producer call.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use envsense_common::events::EnvEvent;
use envsense_common::time::millis_to_duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::FusionEngine;
use crate::producers::{ActivitySource, AudioClassifier, LabelSource};
use crate::state::StreamId;

/// Pull-style producers to poll; any may be absent
#[derive(Default, Clone)]
pub struct Producers {
    pub labels: Option<Arc<dyn LabelSource>>,
    pub audio: Option<Arc<dyn AudioClassifier>>,
    pub activity: Option<Arc<dyn ActivitySource>>,
}

/// Running session
pub struct Session {
    engine: Arc<FusionEngine>,
    cancel: CancellationToken,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl Session {
    /// Restore persisted state and spawn all loops
    pub async fn start(engine: Arc<FusionEngine>, producers: Producers) -> Self {
        engine.restore_manual().await;

        let cancel = CancellationToken::new();
        let config = engine.config().clone();
        let mut tasks = Vec::new();

        {
            let engine = engine.clone();
            tasks.push((
                "sampler",
                tokio::spawn(run_every(
                    "sampler",
                    millis_to_duration(config.sample_interval_ms),
                    cancel.clone(),
                    move || {
                        let engine = engine.clone();
                        async move {
                            engine.sample_tick().await;
                        }
                    },
                )),
            ));
        }

        if let Some(source) = producers.labels {
            let engine = engine.clone();
            let loop_source = source.clone();
            tasks.push((
                "camera",
                tokio::spawn(with_shutdown(
                    run_every(
                        "camera",
                        millis_to_duration(config.camera_interval_ms),
                        cancel.clone(),
                        move || {
                            let engine = engine.clone();
                            let source = loop_source.clone();
                            async move {
                                match source.next_labels().await {
                                    Ok(labels) => {
                                        engine.ingest_visual_labels(&labels).await;
                                    }
                                    Err(e) => engine.report_producer_failure(StreamId::Camera, &e).await,
                                }
                            }
                        },
                    ),
                    async move { source.shutdown().await },
                )),
            ));
        }

        if let Some(classifier) = producers.audio {
            let engine = engine.clone();
            let loop_classifier = classifier.clone();
            tasks.push((
                "audio",
                tokio::spawn(with_shutdown(
                    run_every(
                        "audio",
                        millis_to_duration(config.audio_interval_ms),
                        cancel.clone(),
                        move || {
                            let engine = engine.clone();
                            let classifier = loop_classifier.clone();
                            async move {
                                match classifier.classify().await {
                                    Ok(labels) => engine.ingest_audio(labels).await,
                                    Err(e) => engine.report_producer_failure(StreamId::Audio, &e).await,
                                }
                            }
                        },
                    ),
                    async move { classifier.shutdown().await },
                )),
            ));
        }

        if let Some(source) = producers.activity {
            let engine = engine.clone();
            let loop_source = source.clone();
            tasks.push((
                "activity",
                tokio::spawn(with_shutdown(
                    run_every(
                        "activity",
                        millis_to_duration(config.activity_interval_ms),
                        cancel.clone(),
                        move || {
                            let engine = engine.clone();
                            let source = loop_source.clone();
                            async move {
                                match source.poll().await {
                                    Ok(Some(reading)) => engine.ingest_activity(reading).await,
                                    Ok(None) => {}
                                    Err(e) => engine.report_producer_failure(StreamId::Activity, &e).await,
                                }
                            }
                        },
                    ),
                    async move { source.shutdown().await },
                )),
            ));
        }

        info!("Session started with {} task(s)", tasks.len());
        Self {
            engine,
            cancel,
            tasks,
        }
    }

    pub fn engine(&self) -> &Arc<FusionEngine> {
        &self.engine
    }

    /// Token cancelled on shutdown; lets callers tie their own tasks to the session
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Names of the spawned loops
    pub fn task_names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|(name, _)| *name).collect()
    }

    /// Stop every loop, release producers and discard in-flight state
    pub async fn shutdown(self) {
        info!("Session shutting down");
        self.cancel.cancel();

        for (name, handle) in self.tasks {
            if let Err(e) = handle.await {
                warn!("Task {} ended abnormally: {}", name, e);
            }
        }

        self.engine.reset().await;
        self.engine.state().clear().await;
        self.engine.events().emit_lossy(EnvEvent::SessionStopped {
            timestamp: envsense_common::time::now(),
        });
        info!("Session stopped");
    }
}

/// Run `step` every `period` until `cancel` fires
async fn run_every<F, Fut>(name: &'static str, period: Duration, cancel: CancellationToken, mut step: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!("{} loop started ({}ms interval)", name, period.as_millis());

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = step() => {}
        }
    }

    debug!("{} loop stopped", name);
}

/// Run `body`, then `cleanup`
async fn with_shutdown<B, C>(body: B, cleanup: C)
where
    B: Future<Output = ()>,
    C: Future<Output = ()>,
{
    body.await;
    cleanup.await;
}
