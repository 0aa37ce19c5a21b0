//! Prediction records and generation state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Expected occurrence inside a future window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub id: String,
    pub source_pattern_ids: Vec<String>,
    pub target_window_start: DateTime<Utc>,
    pub target_window_end: DateTime<Utc>,
    pub confidence: f64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub expected_intensity: f64,
    pub expected_tags: Vec<String>,
}

impl Prediction {
    /// Expired predictions are filtered from reads, never deleted
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Whether `instant` falls inside the target window (inclusive)
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.target_window_start <= instant && instant <= self.target_window_end
    }
}

/// Outcome of the most recent generation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PredictionState {
    #[default]
    Idle,
    Generating,
    Ready,
    InsufficientData,
    Error,
}

impl PredictionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionState::Idle => "idle",
            PredictionState::Generating => "generating",
            PredictionState::Ready => "ready",
            PredictionState::InsufficientData => "insufficientData",
            PredictionState::Error => "error",
        }
    }
}

impl std::fmt::Display for PredictionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
