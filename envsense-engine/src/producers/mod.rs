//! Producer interfaces
//!
//! Label sources, audio classifiers and activity sources are black boxes
//! polled on their own cadence by the session's producer loops. Callback-style
//! producers can skip these traits and call the engine's `ingest_*` methods
//! directly (see [`script`]).

pub mod script;

use async_trait::async_trait;

use crate::categorizer::LabelCandidate;
use crate::error::Result;
use crate::state::{ActivityReading, AudioLabel};

/// Visual scene labeler
#[async_trait]
pub trait LabelSource: Send + Sync {
    /// Latest scored label set
    async fn next_labels(&self) -> Result<Vec<LabelCandidate>>;

    /// Release camera/model resources
    async fn shutdown(&self) {}
}

/// Ambient audio-event classifier
#[async_trait]
pub trait AudioClassifier: Send + Sync {
    /// One inference pass over the most recent audio window
    async fn classify(&self) -> Result<Vec<AudioLabel>>;

    /// Release microphone/model resources
    async fn shutdown(&self) {}
}

/// Physical activity recognizer
#[async_trait]
pub trait ActivitySource: Send + Sync {
    /// Latest activity, None when nothing new is available
    async fn poll(&self) -> Result<Option<ActivityReading>>;

    async fn shutdown(&self) {}
}
