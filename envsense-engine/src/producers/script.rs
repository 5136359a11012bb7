//! JSON-lines observation feed
//!
//! Lets an external process (or a recorded session) drive the engine by
//! writing one observation per line, e.g.
//!
//! ```text
//! {"type":"visual","labels":[{"text":"lake","score":0.9}]}
//! {"type":"audio","labels":[{"label":"Wind","score":0.4}]}
//! {"type":"activity","label":"still","confidence":0.8}
//! {"type":"manual","name":"Inside"}
//! ```

use serde::{Deserialize, Serialize};

use crate::categorizer::LabelCandidate;
use crate::engine::FusionEngine;
use crate::error::{Error, Result};
use crate::state::{ActivityReading, AudioLabel};

/// One observation line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Observation {
    Visual { labels: Vec<LabelCandidate> },
    Audio { labels: Vec<AudioLabel> },
    Activity { label: String, confidence: f32 },
    Manual { name: Option<String> },
}

impl Observation {
    /// Parse one line; blank lines and `#` comments yield None
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(None);
        }
        serde_json::from_str(trimmed)
            .map(Some)
            .map_err(|e| Error::InvalidInput(format!("bad observation line: {}", e)))
    }

    /// Feed this observation to the engine
    pub async fn apply(self, engine: &FusionEngine) {
        match self {
            Observation::Visual { labels } => {
                engine.ingest_visual_labels(&labels).await;
            }
            Observation::Audio { labels } => engine.ingest_audio(labels).await,
            Observation::Activity { label, confidence } => {
                engine
                    .ingest_activity(ActivityReading::new(label, confidence))
                    .await
            }
            Observation::Manual { name } => {
                engine.set_manual(name.as_deref()).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_visual() {
        let obs = Observation::parse(r#"{"type":"visual","labels":[{"text":"lake","score":0.9}]}"#)
            .unwrap()
            .unwrap();
        assert_eq!(
            obs,
            Observation::Visual {
                labels: vec![LabelCandidate::new("lake", 0.9)]
            }
        );
    }

    #[test]
    fn test_parse_manual_clear() {
        let obs = Observation::parse(r#"{"type":"manual","name":null}"#).unwrap().unwrap();
        assert_eq!(obs, Observation::Manual { name: None });
    }

    #[test]
    fn test_blank_and_comment_lines_skipped() {
        assert_eq!(Observation::parse("   ").unwrap(), None);
        assert_eq!(Observation::parse("# replay of 2024-06-01").unwrap(), None);
    }

    #[test]
    fn test_bad_line_is_invalid_input() {
        assert!(matches!(
            Observation::parse(r#"{"type":"smell"}"#),
            Err(Error::InvalidInput(_))
        ));
    }
}
