//! Engine snapshots
//!
//! Serialized form of everything the engine owns, handed to the event store
//! at the end of each cycle and accepted back by `AnalyticsEngine::restore`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::TimeBucket;
use crate::insights::Insight;
use crate::patterns::Pattern;
use crate::prediction::{Prediction, PredictionState};

/// Snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Complete engine state at the end of a cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSnapshot {
    pub version: u32,
    pub taken_at: DateTime<Utc>,
    pub buckets: Vec<TimeBucket>,
    pub patterns: Vec<Pattern>,
    pub insights: Vec<Insight>,
    pub predictions: Vec<Prediction>,
    /// Outcome of the prediction run that produced `predictions`
    #[serde(default)]
    pub prediction_state: PredictionState,
}

impl EngineSnapshot {
    pub fn new(
        taken_at: DateTime<Utc>,
        buckets: Vec<TimeBucket>,
        patterns: Vec<Pattern>,
        insights: Vec<Insight>,
        predictions: Vec<Prediction>,
    ) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            taken_at,
            buckets,
            patterns,
            insights,
            predictions,
            prediction_state: PredictionState::Idle,
        }
    }

    pub fn with_prediction_state(mut self, state: PredictionState) -> Self {
        self.prediction_state = state;
        self
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
