//! Behavioral events - the unit of ingestion
//!
//! Events arrive as loosely-typed [`EventInput`] values and are validated
//! into immutable [`Event`]s at ingress. Nothing downstream of the queue ever
//! sees an unvalidated event.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Highest accepted intensity
pub const MAX_INTENSITY: u8 = 10;

/// Longest accepted tag (in characters, after trimming)
pub const MAX_TAG_LENGTH: usize = 64;

// ============================================================================
// ERRORS
// ============================================================================

/// Reasons an event is rejected at ingress
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Event has no timestamp")]
    MissingTimestamp,
    #[error("Event id must not be empty")]
    EmptyId,
    #[error("Intensity {0} is outside 0..={max}", max = MAX_INTENSITY)]
    IntensityOutOfRange(i64),
    #[error("Event contains an empty tag")]
    EmptyTag,
    #[error("Tag '{0}' exceeds {max} characters", max = MAX_TAG_LENGTH)]
    TagTooLong(String),
}

// ============================================================================
// PRIORITY
// ============================================================================

/// Admission priority of an event
///
/// `Critical` events bypass batching and are dispatched before `submit`
/// returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    #[default]
    Normal,
    Low,
}

impl Priority {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
        }
    }

    /// Whether events of this priority skip the batch buffer
    pub fn is_immediate(&self) -> bool {
        matches!(self, Priority::Critical)
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "critical" => Ok(Priority::Critical),
            "high" => Ok(Priority::High),
            "normal" => Ok(Priority::Normal),
            "low" => Ok(Priority::Low),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

// ============================================================================
// EVENT INPUT
// ============================================================================

/// Raw event as produced by the external collaborator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventInput {
    /// Stable id; generated when absent
    pub id: Option<String>,
    /// When the occurrence happened
    pub timestamp: Option<DateTime<Utc>>,
    /// Intensity on a 0-10 scale
    pub intensity: i64,
    /// Contextual tags (triggers, moods, places)
    pub tags: Vec<String>,
    /// Admission priority
    pub priority: Priority,
}

impl EventInput {
    /// Input with a timestamp and intensity, normal priority, no tags
    pub fn new(timestamp: DateTime<Utc>, intensity: i64) -> Self {
        Self {
            timestamp: Some(timestamp),
            intensity,
            ..Default::default()
        }
    }

    /// Builder: set the id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Builder: add tags
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Builder: set the priority
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Validate into an immutable [`Event`]
    pub fn validate(self) -> Result<Event, ValidationError> {
        let timestamp = self.timestamp.ok_or(ValidationError::MissingTimestamp)?;

        let id = match self.id {
            Some(id) if id.trim().is_empty() => return Err(ValidationError::EmptyId),
            Some(id) => id,
            None => Uuid::new_v4().to_string(),
        };

        if !(0..=MAX_INTENSITY as i64).contains(&self.intensity) {
            return Err(ValidationError::IntensityOutOfRange(self.intensity));
        }

        let mut tags = BTreeSet::new();
        for raw in self.tags {
            let tag = raw.trim().to_lowercase();
            if tag.is_empty() {
                return Err(ValidationError::EmptyTag);
            }
            if tag.chars().count() > MAX_TAG_LENGTH {
                return Err(ValidationError::TagTooLong(tag));
            }
            tags.insert(tag);
        }

        Ok(Event {
            id,
            timestamp,
            intensity: self.intensity as u8,
            tags,
            priority: self.priority,
        })
    }
}

impl From<Event> for EventInput {
    fn from(event: Event) -> Self {
        Self {
            id: Some(event.id),
            timestamp: Some(event.timestamp),
            intensity: event.intensity as i64,
            tags: event.tags.into_iter().collect(),
            priority: event.priority,
        }
    }
}

// ============================================================================
// EVENT
// ============================================================================

/// A validated, immutable behavioral event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    id: String,
    timestamp: DateTime<Utc>,
    intensity: u8,
    tags: BTreeSet<String>,
    priority: Priority,
}

impl Event {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn intensity(&self) -> u8 {
        self.intensity
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Hour of day as a fraction (14:30 -> 14.5), UTC
    pub fn fractional_hour(&self) -> f64 {
        self.timestamp.hour() as f64
            + self.timestamp.minute() as f64 / 60.0
            + self.timestamp.second() as f64 / 3600.0
    }

    /// Hour of day (0-23), UTC
    pub fn hour(&self) -> u32 {
        self.timestamp.hour()
    }

    /// Day of week with Monday = 0
    pub fn weekday_index(&self) -> u32 {
        self.timestamp.weekday().num_days_from_monday()
    }
}

// ============================================================================
// TESTS
// ============================================================================
