//! Shared sensor state
//!
//! Last-value-wins holder for every input stream, shared between producer
//! tasks (writers) and the sampler/tracker (readers). One lock per stream;
//! writes to different streams are not ordered relative to each other.

use chrono::{DateTime, Utc};
use envsense_common::events::EnvironmentCategory;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::categorizer::{is_vehicle_reading, CategorizedObservation};

/// Latest value of one stream
#[derive(Debug, Clone, PartialEq)]
pub enum Latest<T> {
    /// Nothing has arrived yet
    Absent,
    Value(T),
    /// The producer failed; holds the error text
    Failed(String),
}

impl<T> Default for Latest<T> {
    fn default() -> Self {
        Latest::Absent
    }
}

impl<T> Latest<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Latest::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Placeholder text for a failed producer
    pub fn error_placeholder(&self) -> Option<String> {
        match self {
            Latest::Failed(e) => Some(format!("Error: {}", e)),
            _ => None,
        }
    }
}

/// Input stream identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamId {
    Camera,
    Audio,
    Activity,
}

impl StreamId {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamId::Camera => "camera",
            StreamId::Audio => "audio",
            StreamId::Activity => "activity",
        }
    }
}

/// One ranked audio-event label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioLabel {
    pub label: String,
    pub score: f32,
}

impl AudioLabel {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Keep the `k` best audio labels, highest score first
pub fn top_k_audio(mut labels: Vec<AudioLabel>, k: usize) -> Vec<AudioLabel> {
    labels.sort_by(|a, b| b.score.total_cmp(&a.score));
    labels.truncate(k);
    labels
}

/// Physical activity update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityReading {
    /// Activity type as reported ("still", "walking", "in_vehicle", ...)
    pub label: String,
    pub confidence: f32,
}

impl ActivityReading {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }

    pub fn is_in_vehicle(&self) -> bool {
        is_vehicle_reading(&self.label)
    }
}

/// The user's declared environment
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ManualDeclaration {
    pub raw_name: Option<String>,
    pub category: Option<EnvironmentCategory>,
}

impl ManualDeclaration {
    /// Build from the raw selection; unrecognised names keep no category
    pub fn from_raw_name(raw_name: Option<&str>) -> Self {
        let raw_name = raw_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        let category = raw_name.as_deref().and_then(manual_category);
        Self { raw_name, category }
    }
}

/// Map a manual selection onto a category
pub fn manual_category(name: &str) -> Option<EnvironmentCategory> {
    match name.trim().to_lowercase().as_str() {
        "inside" | "indoor" | "indoors" => Some(EnvironmentCategory::Inside),
        "outside" | "outdoor" | "outdoors" => Some(EnvironmentCategory::Outside),
        other if is_vehicle_reading(other) => Some(EnvironmentCategory::Inside),
        _ => None,
    }
}

/// Point-in-time copy of every stream
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub camera: Latest<CategorizedObservation>,
    pub audio: Latest<Vec<AudioLabel>>,
    pub activity: Latest<ActivityReading>,
    pub manual: ManualDeclaration,
}

/// Shared state accessible by all tasks
///
/// Injected as `Arc<SharedState>`; there is no global instance.
#[derive(Debug, Default)]
pub struct SharedState {
    camera: RwLock<Latest<CategorizedObservation>>,
    audio: RwLock<Latest<Vec<AudioLabel>>>,
    activity: RwLock<Latest<ActivityReading>>,
    manual: RwLock<ManualDeclaration>,
    last_update: RwLock<Option<DateTime<Utc>>>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn publish_camera(&self, observation: CategorizedObservation) {
        *self.camera.write().await = Latest::Value(observation);
        self.touch(observation.observed_at).await;
    }

    pub async fn publish_audio(&self, labels: Vec<AudioLabel>, at: DateTime<Utc>) {
        *self.audio.write().await = Latest::Value(labels);
        self.touch(at).await;
    }

    pub async fn publish_activity(&self, reading: ActivityReading, at: DateTime<Utc>) {
        *self.activity.write().await = Latest::Value(reading);
        self.touch(at).await;
    }

    /// Replace a stream's value with a failure marker
    pub async fn mark_failed(&self, stream: StreamId, error: impl Into<String>) {
        let error = error.into();
        match stream {
            StreamId::Camera => *self.camera.write().await = Latest::Failed(error),
            StreamId::Audio => *self.audio.write().await = Latest::Failed(error),
            StreamId::Activity => *self.activity.write().await = Latest::Failed(error),
        }
    }

    pub async fn set_manual(&self, declaration: ManualDeclaration) {
        *self.manual.write().await = declaration;
    }

    pub async fn camera(&self) -> Latest<CategorizedObservation> {
        self.camera.read().await.clone()
    }

    pub async fn audio(&self) -> Latest<Vec<AudioLabel>> {
        self.audio.read().await.clone()
    }

    pub async fn activity(&self) -> Latest<ActivityReading> {
        self.activity.read().await.clone()
    }

    pub async fn manual(&self) -> ManualDeclaration {
        self.manual.read().await.clone()
    }

    /// Time of the most recent producer write
    pub async fn last_update(&self) -> Option<DateTime<Utc>> {
        *self.last_update.read().await
    }

    /// Copy every stream, one lock at a time
    pub async fn snapshot(&self) -> Snapshot {
        Snapshot {
            camera: self.camera().await,
            audio: self.audio().await,
            activity: self.activity().await,
            manual: self.manual().await,
        }
    }

    /// Drop every stream value (session teardown)
    pub async fn clear(&self) {
        *self.camera.write().await = Latest::Absent;
        *self.audio.write().await = Latest::Absent;
        *self.activity.write().await = Latest::Absent;
        *self.last_update.write().await = None;
    }

    async fn touch(&self, at: DateTime<Utc>) {
        *self.last_update.write().await = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_defaults_are_absent() {
        let state = SharedState::new();
        let snapshot = state.snapshot().await;
        assert_eq!(snapshot.camera, Latest::Absent);
        assert_eq!(snapshot.audio, Latest::Absent);
        assert_eq!(snapshot.activity, Latest::Absent);
        assert_eq!(snapshot.manual, ManualDeclaration::default());
        assert!(state.last_update().await.is_none());
    }

    #[tokio::test]
    async fn test_last_value_wins() {
        let state = SharedState::new();
        let now = Utc::now();
        state.publish_activity(ActivityReading::new("walking", 0.6), now).await;
        state.publish_activity(ActivityReading::new("still", 0.9), now).await;
        assert_eq!(
            state.activity().await,
            Latest::Value(ActivityReading::new("still", 0.9))
        );
        assert_eq!(state.last_update().await, Some(now));
    }

    #[tokio::test]
    async fn test_failure_replaces_value() {
        let state = SharedState::new();
        state
            .publish_audio(vec![AudioLabel::new("Speech", 0.8)], Utc::now())
            .await;
        state.mark_failed(StreamId::Audio, "model not loaded").await;

        let audio = state.audio().await;
        assert!(audio.value().is_none());
        assert_eq!(audio.error_placeholder().as_deref(), Some("Error: model not loaded"));
    }

    #[tokio::test]
    async fn test_clear_keeps_manual() {
        let state = SharedState::new();
        state
            .set_manual(ManualDeclaration::from_raw_name(Some("Outside")))
            .await;
        state
            .publish_activity(ActivityReading::new("still", 1.0), Utc::now())
            .await;
        state.clear().await;
        assert_eq!(state.activity().await, Latest::Absent);
        assert_eq!(state.manual().await.category, Some(EnvironmentCategory::Outside));
    }

    #[test]
    fn test_manual_names() {
        assert_eq!(manual_category("Inside"), Some(EnvironmentCategory::Inside));
        assert_eq!(manual_category("outdoors"), Some(EnvironmentCategory::Outside));
        assert_eq!(manual_category("In car"), Some(EnvironmentCategory::Inside));
        assert_eq!(manual_category("gym"), None);

        let blank = ManualDeclaration::from_raw_name(Some("   "));
        assert_eq!(blank, ManualDeclaration::default());

        let custom = ManualDeclaration::from_raw_name(Some("Gym"));
        assert_eq!(custom.raw_name.as_deref(), Some("Gym"));
        assert_eq!(custom.category, None);
    }

    #[test]
    fn test_top_k_audio_sorts_and_truncates() {
        let labels = vec![
            AudioLabel::new("Music", 0.2),
            AudioLabel::new("Speech", 0.9),
            AudioLabel::new("Wind", 0.5),
            AudioLabel::new("Traffic", 0.4),
        ];
        let top = top_k_audio(labels, 3);
        let names: Vec<&str> = top.iter().map(|l| l.label.as_str()).collect();
        assert_eq!(names, vec!["Speech", "Wind", "Traffic"]);
    }

    #[test]
    fn test_activity_vehicle_detection() {
        assert!(ActivityReading::new("IN_VEHICLE", 0.9).is_in_vehicle());
        assert!(!ActivityReading::new("on_foot", 0.9).is_in_vehicle());
    }
}
