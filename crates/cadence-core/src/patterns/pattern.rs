//! Patterns
//!
//! A pattern is a recurring regularity inferred from events. Two shapes are
//! supported, expressed as variants of [`PatternKind`]:
//!
//! - **Time-based**: events cluster around a target hour of day
//! - **Trigger-based**: events share a set of contextual tags
//!
//! Confidence combines three factors:
//!
//! ```text
//! confidence = avg_strength × min(count / frequency_saturation, 1)
//!                           × min(span / span_saturation, 1)
//! ```
//!
//! so a pattern has to be strong, frequent and durable at the same time.
//! The field is private; [`Pattern::observe`] is the only way it changes.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::PatternConfig;
use crate::event::Event;

/// Strength observations retained per pattern
const MAX_STRENGTH_HISTORY: usize = 256;

/// Hours in a day, used for circular hour distance
const HOURS_PER_DAY: f64 = 24.0;

/// Hour distance at which time-based strength reaches zero
const STRENGTH_FALLOFF_HOURS: f64 = 12.0;

// ============================================================================
// PATTERN KIND
// ============================================================================

/// Shape of a pattern and its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum PatternKind {
    /// Events around `target_hour`, within ± `window_hours / 2`
    TimeBased { target_hour: u32, window_hours: f64 },
    /// Events sharing at least one of `tags`
    TriggerBased { tags: BTreeSet<String> },
}

impl PatternKind {
    /// Short name of the variant
    pub fn name(&self) -> &'static str {
        match self {
            PatternKind::TimeBased { .. } => "timeBased",
            PatternKind::TriggerBased { .. } => "triggerBased",
        }
    }

    pub fn is_time_based(&self) -> bool {
        matches!(self, PatternKind::TimeBased { .. })
    }

    /// Match strength of `event`, or `None` when it does not match
    pub fn strength(&self, event: &Event) -> Option<f64> {
        match self {
            PatternKind::TimeBased {
                target_hour,
                window_hours,
            } => {
                let distance = hour_distance(event.fractional_hour(), *target_hour as f64);
                if distance <= window_hours / 2.0 {
                    Some((1.0 - distance / STRENGTH_FALLOFF_HOURS).max(0.0))
                } else {
                    None
                }
            }
            PatternKind::TriggerBased { tags } => {
                if tags.is_empty() {
                    return None;
                }
                let shared = tags.intersection(event.tags()).count();
                if shared == 0 {
                    None
                } else {
                    Some(shared as f64 / tags.len() as f64)
                }
            }
        }
    }

    /// Whether two kinds describe the same regularity
    pub fn same_shape(&self, other: &PatternKind) -> bool {
        match (self, other) {
            (
                PatternKind::TimeBased { target_hour: a, .. },
                PatternKind::TimeBased { target_hour: b, .. },
            ) => a == b,
            (PatternKind::TriggerBased { tags: a }, PatternKind::TriggerBased { tags: b }) => a == b,
            _ => false,
        }
    }
}

/// Circular distance between two hours of day (0-12)
pub fn hour_distance(a: f64, b: f64) -> f64 {
    let d = (a - b).abs() % HOURS_PER_DAY;
    d.min(HOURS_PER_DAY - d)
}

// ============================================================================
// PATTERN
// ============================================================================

/// A candidate or established pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pattern {
    id: String,
    kind: PatternKind,
    confidence: f64,
    observation_count: u32,
    first_observed: Option<DateTime<Utc>>,
    last_observed: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    strengths: VecDeque<f64>,
    #[serde(default)]
    intensity_sum: u64,
    #[serde(default)]
    tag_counts: BTreeMap<String, u32>,
    #[serde(default)]
    cycles_survived: u32,
}

impl Pattern {
    /// New pattern with zero confidence and no history
    pub fn new(kind: PatternKind, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            confidence: 0.0,
            observation_count: 0,
            first_observed: None,
            last_observed: None,
            created_at,
            strengths: VecDeque::new(),
            intensity_sum: 0,
            tag_counts: BTreeMap::new(),
            cycles_survived: 0,
        }
    }

    /// Candidate time-based pattern centered on the event's (rounded) hour
    pub fn time_candidate(event: &Event, window_hours: f64) -> Self {
        let target_hour = (event.fractional_hour().round() as u32) % 24;
        Self::new(
            PatternKind::TimeBased {
                target_hour,
                window_hours,
            },
            event.timestamp(),
        )
    }

    /// Candidate trigger-based pattern over the event's full tag set
    pub fn trigger_candidate(event: &Event) -> Option<Self> {
        if event.tags().is_empty() {
            return None;
        }
        Some(Self::new(
            PatternKind::TriggerBased {
                tags: event.tags().clone(),
            },
            event.timestamp(),
        ))
    }

    /// Record `event` if it matches; returns the observation strength
    ///
    /// Confidence is recomputed from the updated history.
    pub fn observe(&mut self, event: &Event, config: &PatternConfig) -> Option<f64> {
        let strength = self.kind.strength(event)?;

        if self.strengths.len() == MAX_STRENGTH_HISTORY {
            self.strengths.pop_front();
        }
        self.strengths.push_back(strength);
        self.observation_count = self.observation_count.saturating_add(1);
        self.intensity_sum = self.intensity_sum.saturating_add(event.intensity() as u64);
        for tag in event.tags() {
            *self.tag_counts.entry(tag.clone()).or_default() += 1;
        }

        let ts = event.timestamp();
        self.first_observed = Some(self.first_observed.map_or(ts, |first| first.min(ts)));
        self.last_observed = Some(self.last_observed.map_or(ts, |last| last.max(ts)));

        self.recompute_confidence(config);
        Some(strength)
    }

    fn recompute_confidence(&mut self, config: &PatternConfig) {
        let frequency_factor =
            (self.observation_count as f64 / config.frequency_saturation.max(1) as f64).min(1.0);
        let time_factor =
            (self.span_seconds() / config.span_saturation_secs.max(1) as f64).min(1.0);
        let confidence = self.average_strength() * frequency_factor * time_factor;

        self.confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
    }

    /// Register that the pattern survived a completed cycle
    pub fn mark_cycle_survived(&mut self) {
        self.cycles_survived = self.cycles_survived.saturating_add(1);
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &PatternKind {
        &self.kind
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn observation_count(&self) -> u32 {
        self.observation_count
    }

    pub fn first_observed(&self) -> Option<DateTime<Utc>> {
        self.first_observed
    }

    pub fn last_observed(&self) -> Option<DateTime<Utc>> {
        self.last_observed
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn cycles_survived(&self) -> u32 {
        self.cycles_survived
    }

    /// Mean of the retained strength observations
    pub fn average_strength(&self) -> f64 {
        if self.strengths.is_empty() {
            0.0
        } else {
            self.strengths.iter().sum::<f64>() / self.strengths.len() as f64
        }
    }

    /// Mean intensity of matched events
    pub fn mean_intensity(&self) -> f64 {
        if self.observation_count == 0 {
            0.0
        } else {
            self.intensity_sum as f64 / self.observation_count as f64
        }
    }

    /// Seconds between first and last observation
    pub fn span_seconds(&self) -> f64 {
        match (self.first_observed, self.last_observed) {
            (Some(first), Some(last)) => (last - first).num_seconds().max(0) as f64,
            _ => 0.0,
        }
    }

    /// Most frequent co-occurring tags, most frequent first (ties alphabetical)
    pub fn top_tags(&self, n: usize) -> Vec<String> {
        let mut tags: Vec<(&String, &u32)> = self.tag_counts.iter().collect();
        tags.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        tags.into_iter().take(n).map(|(t, _)| t.clone()).collect()
    }

    /// Human-readable label
    pub fn label(&self) -> String {
        match &self.kind {
            PatternKind::TimeBased { target_hour, .. } => format!("around {:02}:00", target_hour),
            PatternKind::TriggerBased { tags } => {
                let tags: Vec<&str> = tags.iter().map(String::as_str).collect();
                format!("tagged {}", tags.join(", "))
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
