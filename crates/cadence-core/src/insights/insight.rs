//! Insight records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default relevance half-life scale, in hours
pub const DEFAULT_RELEVANCE_DECAY_HOURS: f64 = 24.0;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InsightError {
    /// Too few aggregated events to say anything
    #[error("Insufficient data: {available} events, need {required}")]
    InsufficientData { available: u64, required: u64 },
    #[error("Insight has an empty title")]
    EmptyTitle,
    #[error("Insight has an empty description")]
    EmptyDescription,
    #[error("Insight confidence {0} is outside [0, 1]")]
    ConfidenceOutOfRange(f64),
    #[error("Insight relevance is not finite")]
    NonFiniteRelevance,
}

// ============================================================================
// INSIGHT KIND
// ============================================================================

/// Category of insight, which fixes its importance weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InsightKind {
    /// Tags associated with high intensity
    Warning,
    /// Tags that recur together with events
    TriggerCorrelation,
    /// Events cluster at a time of day
    TimeOfDay,
}

impl InsightKind {
    /// Fixed importance weight used in relevance
    pub fn weight(&self) -> f64 {
        match self {
            InsightKind::Warning => 1.0,
            InsightKind::TriggerCorrelation => 0.85,
            InsightKind::TimeOfDay => 0.7,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InsightKind::Warning => "warning",
            InsightKind::TriggerCorrelation => "triggerCorrelation",
            InsightKind::TimeOfDay => "timeOfDay",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            InsightKind::Warning => "Context linked to high intensity",
            InsightKind::TriggerCorrelation => "Recurring context",
            InsightKind::TimeOfDay => "Recurring time of day",
        }
    }
}

impl std::fmt::Display for InsightKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// INSIGHT
// ============================================================================

/// Human-readable summary of one pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    pub id: String,
    pub source_pattern_id: String,
    pub kind: InsightKind,
    pub title: String,
    pub description: String,
    pub confidence: f64,
    /// Relevance as of the last computation
    pub relevance_score: f64,
    pub generated_at: DateTime<Utc>,
    /// Decay scale the relevance was computed with
    #[serde(default = "default_decay_hours")]
    pub decay_hours: f64,
}

fn default_decay_hours() -> f64 {
    DEFAULT_RELEVANCE_DECAY_HOURS
}

impl Insight {
    /// `e^(-age_hours / decay_hours) × confidence × weight`
    ///
    /// Age is clamped at zero for reads that precede `generated_at`.
    pub fn relevance_at(&self, now: DateTime<Utc>) -> f64 {
        let age_hours = (now - self.generated_at).num_milliseconds().max(0) as f64 / 3_600_000.0;
        let decay = (-age_hours / self.decay_hours.max(f64::EPSILON)).exp();
        decay * self.confidence * self.kind.weight()
    }

    /// Copy with `relevance_score` recomputed for `now`
    pub fn refreshed(&self, now: DateTime<Utc>) -> Self {
        Self {
            relevance_score: self.relevance_at(now),
            ..self.clone()
        }
    }

    pub fn validate(&self) -> Result<(), InsightError> {
        if self.title.trim().is_empty() {
            return Err(InsightError::EmptyTitle);
        }
        if self.description.trim().is_empty() {
            return Err(InsightError::EmptyDescription);
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(InsightError::ConfidenceOutOfRange(self.confidence));
        }
        if !self.relevance_score.is_finite() {
            return Err(InsightError::NonFiniteRelevance);
        }
        Ok(())
    }
}
