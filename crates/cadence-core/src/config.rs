//! Engine configuration
//!
//! Every component receives its own section explicitly; there is no global
//! configuration state. Defaults mirror the documented thresholds, and
//! [`EngineConfig::from_env`] overlays a handful of `CADENCE_*` variables for
//! deployment tuning.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default number of buffered events that triggers a batch
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Default flush interval for partially-filled batches
pub const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 30;

/// Default timeout for any call to the external store
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;

const SECONDS_PER_DAY: u64 = 86_400;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("Environment variable {name} has invalid value '{value}'")]
    InvalidEnv { name: String, value: String },
}

// ============================================================================
// SECTIONS
// ============================================================================

/// Event queue and batch cadence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueueConfig {
    /// Buffered events that force a batch emission
    pub batch_size: usize,
    /// Seconds after the last emission before a partial batch is released
    pub flush_interval_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval_secs: DEFAULT_FLUSH_INTERVAL_SECS,
        }
    }
}

impl QueueConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }
}

/// Pattern detection, confidence and pruning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatternConfig {
    /// Patterns below this confidence are pruned once established
    pub minimum_confidence: f64,
    /// Patterns need this many observations to survive past their first cycle
    pub minimum_observations: u32,
    /// Hard cap on the candidate set
    pub maximum_patterns: usize,
    /// Width of the hour window of newly detected time-based patterns
    pub time_window_hours: f64,
    /// A match at or above this strength suppresses new candidates of that kind
    pub strong_match_threshold: f64,
    /// Observation count at which the frequency factor saturates
    pub frequency_saturation: u32,
    /// Observed span (seconds) at which the time factor saturates
    pub span_saturation_secs: u64,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            minimum_confidence: 0.3,
            minimum_observations: 3,
            maximum_patterns: 50,
            time_window_hours: 2.0,
            strong_match_threshold: 0.8,
            frequency_saturation: 10,
            span_saturation_secs: 30 * SECONDS_PER_DAY,
        }
    }
}

/// Insight generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InsightConfig {
    /// Only patterns at or above this confidence become insights
    pub minimum_confidence: f64,
    /// Maximum insights kept per cycle
    pub maximum_insights: usize,
    /// Events required in the aggregates before insights are produced
    pub minimum_data_points: u64,
    /// Mean intensity at which a trigger pattern is reported as a warning
    pub warning_intensity: f64,
    /// Hours for relevance to decay by a factor of e
    pub relevance_decay_hours: f64,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            minimum_confidence: 0.6,
            maximum_insights: 10,
            minimum_data_points: 5,
            warning_intensity: 7.0,
            relevance_decay_hours: 24.0,
        }
    }
}

/// Prediction generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PredictionConfig {
    /// Historical events required before any prediction is made
    pub minimum_data_points: usize,
    /// Data volume at which predictions carry full pattern confidence
    pub full_trust_data_points: usize,
    /// Patterns below this confidence are not projected
    pub minimum_confidence: f64,
    /// Cap on predictions per cycle
    pub maximum_predictions: usize,
    /// Expected tags carried on each prediction
    pub expected_tag_count: usize,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            minimum_data_points: 10,
            full_trust_data_points: 30,
            minimum_confidence: 0.3,
            maximum_predictions: 20,
            expected_tag_count: 3,
        }
    }
}

// ============================================================================
// ENGINE CONFIG
// ============================================================================

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub queue: QueueConfig,
    pub patterns: PatternConfig,
    pub insights: InsightConfig,
    pub predictions: PredictionConfig,
    /// Timeout applied to every external store call
    pub store_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue: QueueConfig::default(),
            patterns: PatternConfig::default(),
            insights: InsightConfig::default(),
            predictions: PredictionConfig::default(),
            store_timeout_ms: DEFAULT_STORE_TIMEOUT_MS,
        }
    }
}

impl EngineConfig {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Defaults overlaid with `CADENCE_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides(|name| std::env::var(name).ok())
    }

    /// Overlay variables from an arbitrary lookup (the environment in production)
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_var(&lookup, "CADENCE_BATCH_SIZE")? {
            self.queue.batch_size = v;
        }
        if let Some(v) = parse_var(&lookup, "CADENCE_FLUSH_INTERVAL_SECS")? {
            self.queue.flush_interval_secs = v;
        }
        if let Some(v) = parse_var(&lookup, "CADENCE_MAX_PATTERNS")? {
            self.patterns.maximum_patterns = v;
        }
        if let Some(v) = parse_var(&lookup, "CADENCE_STORE_TIMEOUT_MS")? {
            self.store_timeout_ms = v;
        }
        self.validate()?;
        Ok(self)
    }

    /// Reject values that would make a component misbehave
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.queue.batch_size == 0 {
            return invalid("queue.batchSize must be at least 1");
        }
        if self.queue.flush_interval_secs == 0 {
            return invalid("queue.flushIntervalSecs must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.patterns.minimum_confidence) {
            return invalid("patterns.minimumConfidence must be within [0, 1]");
        }
        if self.patterns.maximum_patterns == 0 {
            return invalid("patterns.maximumPatterns must be at least 1");
        }
        if !(self.patterns.time_window_hours > 0.0 && self.patterns.time_window_hours <= 24.0) {
            return invalid("patterns.timeWindowHours must be within (0, 24]");
        }
        if self.patterns.frequency_saturation == 0 || self.patterns.span_saturation_secs == 0 {
            return invalid("pattern saturation constants must be positive");
        }
        if !(0.0..=1.0).contains(&self.insights.minimum_confidence) {
            return invalid("insights.minimumConfidence must be within [0, 1]");
        }
        if self.insights.relevance_decay_hours <= 0.0 {
            return invalid("insights.relevanceDecayHours must be positive");
        }
        if !(0.0..=1.0).contains(&self.predictions.minimum_confidence) {
            return invalid("predictions.minimumConfidence must be within [0, 1]");
        }
        if self.predictions.full_trust_data_points == 0 {
            return invalid("predictions.fullTrustDataPoints must be at least 1");
        }
        if self.store_timeout_ms == 0 {
            return invalid("storeTimeoutMs must be at least 1");
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, name: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv {
                name: name.to_string(),
                value,
            }),
    }
}

// ============================================================================
// TESTS
// ============================================================================
