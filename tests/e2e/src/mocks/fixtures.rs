//! Test Event Factory
//!
//! Provides utilities for generating realistic event streams:
//! - Single events at a given day and time of day
//! - Batch generation for throughput and concurrency tests
//! - Pre-built scenarios with known regularities

use std::collections::HashMap;

use cadence_core::{EventInput, Priority};
use chrono::{DateTime, Duration, TimeZone, Utc};

/// Tag vocabulary used by generated events
const TAG_POOL: [&str; 8] = [
    "work", "stress", "coffee", "exercise", "sleep", "social", "commute", "reading",
];

/// Factory for creating test events
///
/// All timestamps are offsets from [`TestEventFactory::base_time`], a Monday
/// at midnight UTC, so week and day buckets are predictable.
///
/// # Example
///
/// ```rust,ignore
/// // A single event on day 2 at 14:05
/// let input = TestEventFactory::event(2, 14, 5, 6, &["stress"]);
///
/// // A batch spaced 45 minutes apart
/// let inputs = TestEventFactory::create_batch(100);
///
/// // A scenario with a known daily regularity
/// let scenario = TestEventFactory::create_stress_scenario();
/// ```
pub struct TestEventFactory;

/// Configuration for batch event generation
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Number of events to create
    pub count: usize,
    /// Id prefix; ids are `{prefix}-{index}`
    pub id_prefix: String,
    /// Tags to apply (empty = rotate through the tag pool)
    pub tags: Vec<String>,
    /// Fixed intensity (None = cycle through 0-10)
    pub intensity: Option<i64>,
    /// Minutes between consecutive events
    pub spacing_minutes: i64,
    /// Priority of every event
    pub priority: Priority,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            count: 10,
            id_prefix: "batch".to_string(),
            tags: vec![],
            intensity: None,
            spacing_minutes: 45,
            priority: Priority::Normal,
        }
    }
}

/// Scenario containing related test events
#[derive(Debug)]
pub struct TestScenario {
    /// Events to submit, in chronological order
    pub events: Vec<EventInput>,
    /// Description of the scenario
    pub description: String,
    /// Metadata for test assertions
    pub metadata: HashMap<String, String>,
}

impl TestScenario {
    /// Latest timestamp in the scenario
    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.events.iter().filter_map(|e| e.timestamp).max()
    }

    /// Metadata value parsed as `T`
    pub fn meta<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.metadata.get(key).and_then(|v| v.parse().ok())
    }
}

impl TestEventFactory {
    // ========================================================================
    // SINGLE EVENT CREATION
    // ========================================================================

    /// Monday 2026-03-02 00:00 UTC
    pub fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap()
    }

    /// Instant `day` days after the base, at `hour:minute`
    pub fn at(day: i64, hour: i64, minute: i64) -> DateTime<Utc> {
        Self::base_time() + Duration::days(day) + Duration::hours(hour) + Duration::minutes(minute)
    }

    /// Event on `day` at `hour:minute`
    pub fn event(day: i64, hour: i64, minute: i64, intensity: i64, tags: &[&str]) -> EventInput {
        EventInput::new(Self::at(day, hour, minute), intensity).with_tags(tags.iter().copied())
    }

    /// Critical-priority event, dispatched without batching
    pub fn critical(day: i64, hour: i64, intensity: i64, tags: &[&str]) -> EventInput {
        Self::event(day, hour, 0, intensity, tags).with_priority(Priority::Critical)
    }

    // ========================================================================
    // BATCH CREATION
    // ========================================================================

    /// Create a batch of events with default configuration
    pub fn create_batch(count: usize) -> Vec<EventInput> {
        Self::create_batch_with_config(BatchConfig {
            count,
            ..Default::default()
        })
    }

    /// Create a batch of events with custom configuration
    pub fn create_batch_with_config(config: BatchConfig) -> Vec<EventInput> {
        (0..config.count)
            .map(|i| {
                let at = Self::base_time() + Duration::minutes(i as i64 * config.spacing_minutes);
                let intensity = config.intensity.unwrap_or((i % 11) as i64);
                let tags = if config.tags.is_empty() {
                    Self::generate_tags(2, i)
                } else {
                    config.tags.clone()
                };
                EventInput::new(at, intensity)
                    .with_id(format!("{}-{}", config.id_prefix, i))
                    .with_tags(tags)
                    .with_priority(config.priority)
            })
            .collect()
    }

    // ========================================================================
    // SCENARIOS
    // ========================================================================

    /// Stress spikes around 14:00 on five days across ten days
    ///
    /// Expected: a time-based pattern at hour 14 with five observations.
    pub fn create_stress_scenario() -> TestScenario {
        let days_and_minutes: [(i64, i64); 5] = [(0, 0), (2, 10), (4, -10), (7, 5), (9, -5)];

        let events = days_and_minutes
            .iter()
            .enumerate()
            .map(|(i, (day, minute))| {
                EventInput::new(Self::at(*day, 14, *minute), 6)
                    .with_id(format!("stress-{}", i))
                    .with_tags(["stress"])
            })
            .collect();

        let mut metadata = HashMap::new();
        metadata.insert("target_hour".to_string(), "14".to_string());
        metadata.insert("observations".to_string(), "5".to_string());
        metadata.insert("tag".to_string(), "stress".to_string());

        TestScenario {
            events,
            description: "Stress at 14:00 on days 0, 2, 4, 7 and 9".to_string(),
            metadata,
        }
    }

    /// Morning coffee and evening runs every day for `days` days
    ///
    /// Two regularities with enough data points for full-trust predictions.
    pub fn create_routine_scenario(days: i64) -> TestScenario {
        let mut events = Vec::with_capacity(days as usize * 2);
        for day in 0..days {
            let jitter = (day % 3) * 5;
            events.push(
                EventInput::new(Self::at(day, 8, jitter), 3)
                    .with_id(format!("coffee-{}", day))
                    .with_tags(["coffee"]),
            );
            events.push(
                EventInput::new(Self::at(day, 19, jitter), 7)
                    .with_id(format!("run-{}", day))
                    .with_tags(["exercise"]),
            );
        }

        let mut metadata = HashMap::new();
        metadata.insert("morning_hour".to_string(), "8".to_string());
        metadata.insert("evening_hour".to_string(), "19".to_string());
        metadata.insert("days".to_string(), days.to_string());

        TestScenario {
            events,
            description: format!("Coffee at 08:00 and runs at 19:00 for {} days", days),
            metadata,
        }
    }

    /// Events at scattered hours that share no regularity
    pub fn create_noise_scenario(count: usize, seed: usize) -> TestScenario {
        let events = (0..count)
            .map(|i| {
                let mixed = (i * 7 + seed * 13) % 24;
                EventInput::new(
                    Self::at(i as i64, mixed as i64, ((i * 17) % 60) as i64),
                    ((i + seed) % 11) as i64,
                )
                .with_id(format!("noise-{}-{}", seed, i))
                .with_tags(Self::generate_tags(1, i + seed))
            })
            .collect();

        TestScenario {
            events,
            description: format!("{} scattered events", count),
            metadata: HashMap::new(),
        }
    }

    // ========================================================================
    // UTILITIES
    // ========================================================================

    /// Deterministic tags drawn from the pool
    pub fn generate_tags(count: usize, seed: usize) -> Vec<String> {
        (0..count)
            .map(|i| TAG_POOL[(seed + i * 3) % TAG_POOL.len()].to_string())
            .collect()
    }

    /// Fresh id with a readable prefix
    pub fn unique_id(prefix: &str) -> String {
        format!("{}-{}", prefix, uuid::Uuid::new_v4())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stress_scenario_shape() {
        let scenario = TestEventFactory::create_stress_scenario();
        assert_eq!(scenario.events.len(), 5);
        assert_eq!(scenario.meta::<u32>("target_hour"), Some(14));
        assert_eq!(
            scenario.last_timestamp(),
            Some(TestEventFactory::at(9, 13, 55))
        );
    }

    #[test]
    fn test_batch_ids_are_prefixed() {
        let batch = TestEventFactory::create_batch_with_config(BatchConfig {
            count: 3,
            id_prefix: "p".to_string(),
            ..Default::default()
        });
        let ids: Vec<_> = batch.iter().filter_map(|e| e.id.clone()).collect();
        assert_eq!(ids, vec!["p-0", "p-1", "p-2"]);
    }
}
