//! Label Categorizer
//!
//! Maps a scored set of scene labels onto [`EnvironmentCategory`] using a
//! max-score rule over two closed keyword vocabularies.
//!
//! # Decision rule (evaluated in order)
//! 1. `inside >= outside && inside > 0` → Inside (ties go to Inside)
//! 2. `outside > inside && outside > 0` → Outside
//! 3. otherwise → Unknown with confidence 0
//!
//! Pure and stateless; safe to call from any task without locking.

use chrono::{DateTime, Utc};
use envsense_common::events::EnvironmentCategory;
use serde::{Deserialize, Serialize};

/// Keywords indicating an enclosed environment (lowercase, substring match)
pub const INSIDE_KEYWORDS: &[&str] = &[
    "room", "office", "chair", "desk", "indoor", "interior", "kitchen", "bedroom",
    "bathroom", "living room", "ceiling", "sofa", "couch", "bed", "shelf", "hallway",
    "corridor", "classroom", "library", "restaurant", "store", "shop", "computer",
    "monitor", "television", "window blind", "curtain", "wall",
];

/// Keywords indicating open air (lowercase, substring match)
pub const OUTSIDE_KEYWORDS: &[&str] = &[
    "outdoor", "tree", "sky", "lake", "ocean", "seaside", "beach", "river", "mountain",
    "grass", "field", "forest", "park", "street", "road", "garden", "cloud", "snow",
    "sunset", "sidewalk", "bridge", "waterfall", "desert", "plant", "flower",
];

/// Readings that mean "enclosed in a vehicle"
pub const VEHICLE_KEYWORDS: &[&str] = &["in car", "in vehicle", "in_vehicle", "car interior"];

/// One scored label from a classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelCandidate {
    pub text: String,
    pub score: f32,
}

impl LabelCandidate {
    pub fn new(text: impl Into<String>, score: f32) -> Self {
        Self {
            text: text.into(),
            score,
        }
    }
}

/// Result of categorizing one label snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategorizedObservation {
    pub category: EnvironmentCategory,
    pub confidence: f32,
    pub observed_at: DateTime<Utc>,
}

fn matches_any(text: &str, vocabulary: &[&str]) -> bool {
    let lowered = text.to_lowercase();
    vocabulary.iter().any(|kw| lowered.contains(kw))
}

/// Scores outside [0, 1] are clamped; NaN counts as no evidence
fn sanitize(score: f32) -> f32 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

fn max_score(candidates: &[LabelCandidate], vocabulary: &[&str]) -> f32 {
    candidates
        .iter()
        .filter(|c| matches_any(&c.text, vocabulary))
        .map(|c| sanitize(c.score))
        .fold(0.0, f32::max)
}

/// `(inside_score, outside_score)` for a label set
pub fn category_scores(candidates: &[LabelCandidate]) -> (f32, f32) {
    (
        max_score(candidates, INSIDE_KEYWORDS),
        max_score(candidates, OUTSIDE_KEYWORDS),
    )
}

/// Categorize a label set into `(category, confidence)`
pub fn categorize(candidates: &[LabelCandidate]) -> (EnvironmentCategory, f32) {
    let (inside, outside) = category_scores(candidates);

    if inside >= outside && inside > 0.0 {
        (EnvironmentCategory::Inside, inside)
    } else if outside > inside && outside > 0.0 {
        (EnvironmentCategory::Outside, outside)
    } else {
        (EnvironmentCategory::Unknown, 0.0)
    }
}

/// Categorize and stamp with the observation time
pub fn observe(candidates: &[LabelCandidate], now: DateTime<Utc>) -> CategorizedObservation {
    let (category, confidence) = categorize(candidates);
    CategorizedObservation {
        category,
        confidence,
        observed_at: now,
    }
}

/// True when a reading (activity type or label) denotes being in a vehicle
pub fn is_vehicle_reading(text: &str) -> bool {
    matches_any(text, VEHICLE_KEYWORDS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(items: &[(&str, f32)]) -> Vec<LabelCandidate> {
        items.iter().map(|(t, s)| LabelCandidate::new(*t, *s)).collect()
    }

    #[test]
    fn test_office_chair_is_inside() {
        let result = categorize(&labels(&[("office chair", 0.8), ("tree", 0.2)]));
        assert_eq!(result, (EnvironmentCategory::Inside, 0.8));
    }

    #[test]
    fn test_lake_is_outside() {
        let result = categorize(&labels(&[("lake", 0.9)]));
        assert_eq!(result, (EnvironmentCategory::Outside, 0.9));
    }

    #[test]
    fn test_exact_tie_resolves_to_inside() {
        for score in [0.01_f32, 0.5, 0.73, 1.0] {
            let result = categorize(&labels(&[("tree", score), ("desk", score)]));
            assert_eq!(result, (EnvironmentCategory::Inside, score));
        }
    }

    #[test]
    fn test_no_matches_is_unknown_zero() {
        assert_eq!(
            categorize(&labels(&[("cat", 0.99), ("dog", 0.7)])),
            (EnvironmentCategory::Unknown, 0.0)
        );
        assert_eq!(categorize(&[]), (EnvironmentCategory::Unknown, 0.0));
    }

    #[test]
    fn test_zero_scores_are_unknown() {
        let result = categorize(&labels(&[("kitchen", 0.0), ("forest", 0.0)]));
        assert_eq!(result, (EnvironmentCategory::Unknown, 0.0));
    }

    #[test]
    fn test_match_is_case_insensitive_substring() {
        let result = categorize(&labels(&[("Living Room Window", 0.4), ("SNOWFIELD", 0.6)]));
        assert_eq!(result, (EnvironmentCategory::Outside, 0.6));
    }

    #[test]
    fn test_max_not_sum() {
        // Many weak inside labels never outweigh one stronger outside label
        let result = categorize(&labels(&[
            ("desk", 0.3),
            ("chair", 0.3),
            ("shelf", 0.3),
            ("sky", 0.5),
        ]));
        assert_eq!(result, (EnvironmentCategory::Outside, 0.5));
    }

    #[test]
    fn test_out_of_range_scores_are_clamped() {
        let result = categorize(&labels(&[("beach", 1.7), ("bedroom", f32::NAN)]));
        assert_eq!(result, (EnvironmentCategory::Outside, 1.0));
    }

    #[test]
    fn test_observe_stamps_time() {
        let now = Utc::now();
        let obs = observe(&labels(&[("street", 0.6)]), now);
        assert_eq!(obs.category, EnvironmentCategory::Outside);
        assert_eq!(obs.observed_at, now);
    }

    #[test]
    fn test_vehicle_readings() {
        assert!(is_vehicle_reading("IN_VEHICLE"));
        assert!(is_vehicle_reading("in car"));
        assert!(!is_vehicle_reading("walking"));
    }
}
