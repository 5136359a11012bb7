//! Session lifecycle tests
//!
//! Run on a paused tokio clock so interval loops advance deterministically.

mod helpers;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use envsense_common::events::{EnvEvent, EnvironmentCategory, LogStream};
use envsense_engine::categorizer::LabelCandidate;
use envsense_engine::producers::LabelSource;
use envsense_engine::sinks::{LogSink, SettingsStore};
use envsense_engine::state::{ActivityReading, AudioLabel, Latest};
use envsense_engine::{Producers, Result, Session};
use helpers::{labels, FakeActivitySource, FakeAudioClassifier, FakeLabelSource, Harness};

/// Never answers
struct StuckLabelSource;

#[async_trait]
impl LabelSource for StuckLabelSource {
    async fn next_labels(&self) -> Result<Vec<LabelCandidate>> {
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn test_loops_poll_producers_on_their_cadence() {
    let h = Harness::new();
    let camera = Arc::new(FakeLabelSource::new(labels(&[("office chair", 0.8)])));
    let audio = Arc::new(FakeAudioClassifier::new(vec![AudioLabel::new("Speech", 0.7)]));

    let session = Session::start(
        h.engine.clone(),
        Producers {
            labels: Some(camera.clone()),
            audio: Some(audio.clone()),
            activity: None,
        },
    )
    .await;
    assert_eq!(session.task_names(), vec!["sampler", "camera", "audio"]);

    tokio::time::sleep(Duration::from_millis(2_100)).await;

    // Camera every 1000ms, audio every 500ms, first tick immediate
    assert!(camera.calls.load(Ordering::SeqCst) >= 2);
    assert!(audio.calls.load(Ordering::SeqCst) >= 4);

    match h.engine.state().camera().await {
        Latest::Value(obs) => assert_eq!(obs.category, EnvironmentCategory::Inside),
        other => panic!("expected camera value, got {:?}", other),
    }
    assert_eq!(
        h.engine.state().audio().await.value().map(|a| a[0].label.clone()),
        Some("Speech".to_string())
    );

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_producer_failure_becomes_placeholder() {
    let mut h = Harness::new();
    let audio = Arc::new(FakeAudioClassifier::new(Vec::new()));
    audio.failing.store(true, Ordering::SeqCst);

    let session = Session::start(
        h.engine.clone(),
        Producers {
            audio: Some(audio.clone()),
            ..Producers::default()
        },
    )
    .await;
    tokio::time::sleep(Duration::from_millis(600)).await;

    let placeholder = h.engine.state().audio().await.error_placeholder();
    assert_eq!(placeholder.as_deref(), Some("Error: Producer error (audio): interpreter crashed"));

    let failures = h
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, EnvEvent::ProducerFailed { producer, .. } if producer == "audio"))
        .count();
    assert!(failures >= 1);

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_releases_producers_and_clears_state() {
    let mut h = Harness::new();
    let camera = Arc::new(FakeLabelSource::new(labels(&[("lake", 0.9)])));
    let audio = Arc::new(FakeAudioClassifier::new(vec![AudioLabel::new("Wind", 0.4)]));
    let activity = Arc::new(FakeActivitySource::new(Some(ActivityReading::new("walking", 0.6))));

    let session = Session::start(
        h.engine.clone(),
        Producers {
            labels: Some(camera.clone()),
            audio: Some(audio.clone()),
            activity: Some(activity.clone()),
        },
    )
    .await;
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    assert!(h.engine.state().last_update().await.is_some());

    session.shutdown().await;

    assert!(camera.shut_down.load(Ordering::SeqCst));
    assert!(audio.shut_down.load(Ordering::SeqCst));
    assert!(activity.shut_down.load(Ordering::SeqCst));
    assert_eq!(h.engine.state().camera().await, Latest::Absent);
    assert_eq!(h.engine.mismatch_state().await.count, 0);
    assert!(h
        .drain_events()
        .iter()
        .any(|e| matches!(e, EnvEvent::SessionStopped { .. })));

    // Nothing polls after shutdown
    let calls = camera.calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(5_000)).await;
    assert_eq!(camera.calls.load(Ordering::SeqCst), calls);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_does_not_wait_for_stuck_producer() {
    let h = Harness::new();
    let session = Session::start(
        h.engine.clone(),
        Producers {
            labels: Some(Arc::new(StuckLabelSource)),
            ..Producers::default()
        },
    )
    .await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    tokio::time::timeout(Duration::from_secs(1), session.shutdown())
        .await
        .expect("shutdown should not hang on a stuck producer");
}

#[tokio::test(start_paused = true)]
async fn test_start_restores_persisted_manual_selection() {
    let h = Harness::new();
    h.settings.set_manual_selection(Some("Outdoor")).unwrap();

    let session = Session::start(h.engine.clone(), Producers::default()).await;

    let manual = h.engine.state().manual().await;
    assert_eq!(manual.raw_name.as_deref(), Some("Outdoor"));
    assert_eq!(manual.category, Some(EnvironmentCategory::Outside));

    session.shutdown().await;
    // Manual selection survives teardown
    assert_eq!(h.engine.state().manual().await.category, Some(EnvironmentCategory::Outside));
}

#[tokio::test(start_paused = true)]
async fn test_sampler_loop_writes_first_window_immediately() {
    let h = Harness::new();
    let session = Session::start(h.engine.clone(), Producers::default()).await;
    tokio::time::sleep(Duration::from_millis(3_500)).await;

    // Engine clock is frozen, so only the first window is ever open
    for stream in LogStream::ALL {
        assert_eq!(h.log.read_back(stream).unwrap().len(), 1);
    }

    session.shutdown().await;
}
