//! # Prediction Engine
//!
//! Projects confident time-based patterns forward into the next occurrence
//! of their hour window, and scores past predictions against what actually
//! happened.
//!
//! ## Windows
//!
//! For a pattern centered on `target_hour` with width `window_hours`:
//!
//! ```text
//! window_start = next instant after now at (target_hour - window_hours / 2)
//! window_end   = window_start + window_hours
//! expires_at   = window_end + window_hours × 0.5
//! ```
//!
//! ## Scoring
//!
//! `score(prediction, event)` averages three proximities in `[0, 1]`
//! (time, intensity, tag overlap) and scales the average by the
//! prediction's own confidence.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use super::record::{Prediction, PredictionState};
use crate::config::PredictionConfig;
use crate::event::Event;
use crate::patterns::{Pattern, PatternKind};

// ============================================================================
// CONFIGURATION CONSTANTS
// ============================================================================

/// Seconds per hour
const SECONDS_PER_HOUR: f64 = 3600.0;

/// Expiry grace after the window closes, as a fraction of the window
const EXPIRY_GRACE_FACTOR: f64 = 0.5;

/// Maximum intensity distance used to normalize intensity proximity
const INTENSITY_RANGE: f64 = 10.0;

/// Tag score when a prediction carries no expected tags
const NEUTRAL_TAG_SCORE: f64 = 0.5;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PredictionError {
    /// Fewer historical events than the configured floor
    #[error("Insufficient data: {available} events, need {required}")]
    InsufficientData { available: u64, required: u64 },

    /// Calendar arithmetic left the representable range
    #[error("Cannot project window for {0}")]
    WindowOutOfRange(DateTime<Utc>),
}

pub type Result<T> = std::result::Result<T, PredictionError>;

// ============================================================================
// ACCURACY
// ============================================================================

/// Best match found for one prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionScore {
    pub prediction_id: String,
    /// Highest score over all actual events (0 when none were given)
    pub best_score: f64,
    pub best_event_id: Option<String>,
    /// An actual event fell inside the predicted window
    pub hit: bool,
}

/// Retrospective accuracy of a set of predictions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccuracyReport {
    pub evaluated: usize,
    pub hits: usize,
    pub mean_accuracy: f64,
    pub scores: Vec<PredictionScore>,
}

impl AccuracyReport {
    pub fn hit_rate(&self) -> f64 {
        if self.evaluated == 0 {
            0.0
        } else {
            self.hits as f64 / self.evaluated as f64
        }
    }
}

// ============================================================================
// ENGINE
// ============================================================================

/// Generates and scores predictions
///
/// Generation is a pure function of its inputs. The engine records the
/// resulting [`PredictionState`] alongside the predictions it publishes.
#[derive(Debug, Default)]
pub struct PredictionEngine {
    config: PredictionConfig,
}

impl PredictionEngine {
    pub fn new(config: PredictionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PredictionConfig {
        &self.config
    }

    /// State a generation run ends in
    pub fn state_of(outcome: &Result<Vec<Prediction>>) -> PredictionState {
        match outcome {
            Ok(_) => PredictionState::Ready,
            Err(PredictionError::InsufficientData { .. }) => PredictionState::InsufficientData,
            Err(_) => PredictionState::Error,
        }
    }

    /// Project `patterns` into their next windows after `now`
    ///
    /// `data_points` is the number of historical events the patterns were
    /// learned from.
    pub fn predict(
        &self,
        patterns: &[Pattern],
        data_points: u64,
        now: DateTime<Utc>,
    ) -> Result<Vec<Prediction>> {
        let required = self.config.minimum_data_points as u64;
        if data_points < required {
            debug!(data_points, required, "Not enough data to predict");
            return Err(PredictionError::InsufficientData {
                available: data_points,
                required,
            });
        }

        let predictions = self.project_all(patterns, data_points, now)?;
        info!(count = predictions.len(), "Generated predictions");
        Ok(predictions)
    }

    fn project_all(
        &self,
        patterns: &[Pattern],
        data_points: u64,
        now: DateTime<Utc>,
    ) -> Result<Vec<Prediction>> {
        let trust = (data_points as f64 / self.config.full_trust_data_points.max(1) as f64).min(1.0);

        let mut predictions = Vec::new();
        for pattern in patterns {
            if pattern.confidence() < self.config.minimum_confidence {
                continue;
            }
            let PatternKind::TimeBased {
                target_hour,
                window_hours,
            } = pattern.kind()
            else {
                continue;
            };

            let start = next_window_start(*target_hour, *window_hours, now)?;
            let window = Duration::milliseconds((window_hours * SECONDS_PER_HOUR * 1000.0) as i64);
            let grace = Duration::milliseconds(
                (window_hours * EXPIRY_GRACE_FACTOR * SECONDS_PER_HOUR * 1000.0) as i64,
            );
            let end = start
                .checked_add_signed(window)
                .ok_or(PredictionError::WindowOutOfRange(start))?;
            let expires_at = end
                .checked_add_signed(grace)
                .ok_or(PredictionError::WindowOutOfRange(end))?;

            predictions.push(Prediction {
                id: Uuid::new_v4().to_string(),
                source_pattern_ids: vec![pattern.id().to_string()],
                target_window_start: start,
                target_window_end: end,
                confidence: (pattern.confidence() * trust).clamp(0.0, 1.0),
                expires_at,
                created_at: now,
                expected_intensity: pattern.mean_intensity(),
                expected_tags: pattern.top_tags(self.config.expected_tag_count),
            });
        }

        predictions.sort_by(|a, b| {
            a.target_window_start.cmp(&b.target_window_start).then_with(|| {
                b.confidence
                    .partial_cmp(&a.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
        });
        predictions.truncate(self.config.maximum_predictions);
        Ok(predictions)
    }

    /// Score one prediction against one actual event
    pub fn score(prediction: &Prediction, actual: &Event) -> f64 {
        let time = time_proximity(prediction, actual.timestamp());
        let intensity = (1.0
            - (prediction.expected_intensity - actual.intensity() as f64).abs() / INTENSITY_RANGE)
            .clamp(0.0, 1.0);
        let tags = tag_overlap(&prediction.expected_tags, actual.tags());

        ((time + intensity + tags) / 3.0 * prediction.confidence).clamp(0.0, 1.0)
    }

    /// Best score of each prediction over `actuals`
    pub fn evaluate(predictions: &[Prediction], actuals: &[Event]) -> AccuracyReport {
        let scores: Vec<PredictionScore> = predictions
            .iter()
            .map(|prediction| {
                let best = actuals
                    .iter()
                    .map(|e| (Self::score(prediction, e), e))
                    .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
                PredictionScore {
                    prediction_id: prediction.id.clone(),
                    best_score: best.map(|(s, _)| s).unwrap_or(0.0),
                    best_event_id: best.map(|(_, e)| e.id().to_string()),
                    hit: actuals.iter().any(|e| prediction.contains(e.timestamp())),
                }
            })
            .collect();

        let evaluated = scores.len();
        let mean_accuracy = if evaluated == 0 {
            0.0
        } else {
            scores.iter().map(|s| s.best_score).sum::<f64>() / evaluated as f64
        };

        AccuracyReport {
            evaluated,
            hits: scores.iter().filter(|s| s.hit).count(),
            mean_accuracy,
            scores,
        }
    }
}

/// Next instant strictly after `now` at which the window opens
fn next_window_start(target_hour: u32, window_hours: f64, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let opening_hour = (target_hour as f64 - window_hours / 2.0).rem_euclid(24.0);
    let offset = Duration::milliseconds((opening_hour * SECONDS_PER_HOUR * 1000.0).round() as i64);

    let midnight = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|m| m.and_utc())
        .ok_or(PredictionError::WindowOutOfRange(now))?;
    let today = midnight
        .checked_add_signed(offset)
        .ok_or(PredictionError::WindowOutOfRange(now))?;

    if today > now {
        Ok(today)
    } else {
        today
            .checked_add_signed(Duration::days(1))
            .ok_or(PredictionError::WindowOutOfRange(now))
    }
}

/// 1 inside the window, falling linearly to 0 one window length outside
fn time_proximity(prediction: &Prediction, at: DateTime<Utc>) -> f64 {
    if prediction.contains(at) {
        return 1.0;
    }
    let window = (prediction.target_window_end - prediction.target_window_start)
        .num_milliseconds()
        .max(1) as f64;
    let distance = if at < prediction.target_window_start {
        prediction.target_window_start - at
    } else {
        at - prediction.target_window_end
    }
    .num_milliseconds() as f64;

    (1.0 - distance / window).clamp(0.0, 1.0)
}

/// Jaccard similarity, neutral when nothing was expected
fn tag_overlap(expected: &[String], actual: &BTreeSet<String>) -> f64 {
    if expected.is_empty() {
        return NEUTRAL_TAG_SCORE;
    }
    let expected: BTreeSet<&String> = expected.iter().collect();
    let intersection = actual.iter().filter(|t| expected.contains(t)).count();
    let union = expected.len() + actual.len() - intersection;
    if union == 0 {
        NEUTRAL_TAG_SCORE
    } else {
        intersection as f64 / union as f64
    }
}

// ============================================================================
// TESTS
// ============================================================================
