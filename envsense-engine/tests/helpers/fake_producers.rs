//! Scripted producers

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use envsense_engine::categorizer::LabelCandidate;
use envsense_engine::producers::{ActivitySource, AudioClassifier, LabelSource};
use envsense_engine::state::{ActivityReading, AudioLabel};
use envsense_engine::{Error, Result};

/// Returns the same labels every call, or an error while `failing`
#[derive(Default)]
pub struct FakeLabelSource {
    labels: Mutex<Vec<LabelCandidate>>,
    pub calls: AtomicUsize,
    pub failing: AtomicBool,
    pub shut_down: AtomicBool,
}

impl FakeLabelSource {
    pub fn new(labels: Vec<LabelCandidate>) -> Self {
        Self {
            labels: Mutex::new(labels),
            ..Self::default()
        }
    }

    pub fn set_labels(&self, labels: Vec<LabelCandidate>) {
        *self.labels.lock().unwrap() = labels;
    }
}

#[async_trait]
impl LabelSource for FakeLabelSource {
    async fn next_labels(&self) -> Result<Vec<LabelCandidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::producer("camera", "camera unavailable"));
        }
        Ok(self.labels.lock().unwrap().clone())
    }

    async fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeAudioClassifier {
    labels: Mutex<Vec<AudioLabel>>,
    pub calls: AtomicUsize,
    pub failing: AtomicBool,
    pub shut_down: AtomicBool,
}

impl FakeAudioClassifier {
    pub fn new(labels: Vec<AudioLabel>) -> Self {
        Self {
            labels: Mutex::new(labels),
            ..Self::default()
        }
    }
}

#[async_trait]
impl AudioClassifier for FakeAudioClassifier {
    async fn classify(&self) -> Result<Vec<AudioLabel>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::producer("audio", "interpreter crashed"));
        }
        Ok(self.labels.lock().unwrap().clone())
    }

    async fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeActivitySource {
    reading: Mutex<Option<ActivityReading>>,
    pub shut_down: AtomicBool,
}

impl FakeActivitySource {
    pub fn new(reading: Option<ActivityReading>) -> Self {
        Self {
            reading: Mutex::new(reading),
            ..Self::default()
        }
    }
}

#[async_trait]
impl ActivitySource for FakeActivitySource {
    async fn poll(&self) -> Result<Option<ActivityReading>> {
        Ok(self.reading.lock().unwrap().clone())
    }

    async fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }
}
