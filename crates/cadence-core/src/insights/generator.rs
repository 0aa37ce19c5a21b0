//! Insight Generator
//!
//! Turns confident patterns into ranked insights. Wording is enriched from
//! the daily aggregates: how much of all activity a time window holds, how
//! often a tag was logged, and which weekday is busiest.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use super::insight::{Insight, InsightError, InsightKind};
use crate::aggregate::{Granularity, TimeBucket, weekday_name};
use crate::config::InsightConfig;
use crate::patterns::{Pattern, PatternKind, hour_distance};

/// Totals over a set of daily buckets
#[derive(Debug, Default)]
struct ActivitySummary {
    events: u64,
    hours: BTreeMap<u32, u64>,
    weekdays: BTreeMap<u32, u64>,
    tags: BTreeMap<String, u64>,
}

impl ActivitySummary {
    /// Only day buckets are summed; week and month hold the same events
    fn from_buckets(buckets: &[TimeBucket]) -> Self {
        let mut summary = Self::default();
        for bucket in buckets.iter().filter(|b| b.granularity == Granularity::Day) {
            summary.events += bucket.count;
            for (hour, n) in &bucket.time_of_day_histogram {
                *summary.hours.entry(*hour).or_default() += n;
            }
            for (day, n) in &bucket.weekday_histogram {
                *summary.weekdays.entry(*day).or_default() += n;
            }
            for (tag, n) in &bucket.tag_frequency {
                *summary.tags.entry(tag.clone()).or_default() += n;
            }
        }
        summary
    }

    /// Events whose hour cell lies within `half_window` of `target_hour`
    fn events_near(&self, target_hour: u32, half_window: f64) -> u64 {
        self.hours
            .iter()
            .filter(|(hour, _)| hour_distance(**hour as f64, target_hour as f64) <= half_window)
            .map(|(_, n)| *n)
            .sum()
    }

    fn busiest_weekday(&self) -> Option<&'static str> {
        self.weekdays
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(day, _)| weekday_name(*day))
    }

    fn share(&self, n: u64) -> f64 {
        if self.events == 0 {
            0.0
        } else {
            n as f64 / self.events as f64 * 100.0
        }
    }
}

/// Builds ranked insights from patterns and aggregates
#[derive(Debug, Clone)]
pub struct InsightGenerator {
    config: InsightConfig,
}

impl Default for InsightGenerator {
    fn default() -> Self {
        Self::new(InsightConfig::default())
    }
}

impl InsightGenerator {
    pub fn new(config: InsightConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InsightConfig {
        &self.config
    }

    /// Generate insights as of `now`
    ///
    /// Returns `InsufficientData` when the aggregates hold fewer than
    /// `minimum_data_points` events.
    pub fn generate(
        &self,
        patterns: &[Pattern],
        daily_buckets: &[TimeBucket],
        now: DateTime<Utc>,
    ) -> Result<Vec<Insight>, InsightError> {
        let summary = ActivitySummary::from_buckets(daily_buckets);
        if summary.events < self.config.minimum_data_points {
            return Err(InsightError::InsufficientData {
                available: summary.events,
                required: self.config.minimum_data_points,
            });
        }

        let mut insights: Vec<Insight> = patterns
            .iter()
            .filter(|p| p.confidence() >= self.config.minimum_confidence)
            .filter_map(|p| {
                let insight = self.describe(p, &summary, now);
                match insight.validate() {
                    Ok(()) => Some(insight),
                    Err(e) => {
                        debug!(pattern_id = p.id(), error = %e, "Dropping invalid insight");
                        None
                    }
                }
            })
            .collect();

        insights.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        insights.truncate(self.config.maximum_insights);

        debug!(
            candidates = patterns.len(),
            generated = insights.len(),
            "Generated insights"
        );
        Ok(insights)
    }

    fn describe(&self, pattern: &Pattern, summary: &ActivitySummary, now: DateTime<Utc>) -> Insight {
        let (kind, title, description) = match pattern.kind() {
            PatternKind::TimeBased {
                target_hour,
                window_hours,
            } => {
                let near = summary.events_near(*target_hour, window_hours / 2.0);
                let mut description = format!(
                    "{} events ({:.0}% of all logged events) happened within {:.1}h of {:02}:00.",
                    near,
                    summary.share(near),
                    window_hours / 2.0,
                    target_hour
                );
                if let Some(day) = summary.busiest_weekday() {
                    description.push_str(&format!(" {} is the busiest day.", day));
                }
                (
                    InsightKind::TimeOfDay,
                    format!("Activity clusters around {:02}:00", target_hour),
                    description,
                )
            }
            PatternKind::TriggerBased { tags } => {
                let joined = tags.iter().map(String::as_str).collect::<Vec<_>>().join(", ");
                let logged: u64 = tags.iter().filter_map(|t| summary.tags.get(t)).sum();
                let mean = pattern.mean_intensity();

                if mean >= self.config.warning_intensity {
                    (
                        InsightKind::Warning,
                        format!("High intensity when tagged {}", joined),
                        format!(
                            "Events tagged {} average an intensity of {:.1} out of 10 across {} observations.",
                            joined,
                            mean,
                            pattern.observation_count()
                        ),
                    )
                } else {
                    let companions: Vec<String> = pattern
                        .top_tags(tags.len() + 2)
                        .into_iter()
                        .filter(|t| !tags.contains(t))
                        .collect();
                    let mut description = format!(
                        "{} was logged {} times with an average intensity of {:.1}.",
                        joined, logged, mean
                    );
                    if !companions.is_empty() {
                        description.push_str(&format!(" Often seen with {}.", companions.join(", ")));
                    }
                    (
                        InsightKind::TriggerCorrelation,
                        format!("{} keeps coming up", joined),
                        description,
                    )
                }
            }
        };

        let confidence = pattern.confidence();
        Insight {
            id: Uuid::new_v4().to_string(),
            source_pattern_id: pattern.id().to_string(),
            kind,
            title,
            description,
            confidence,
            relevance_score: confidence * kind.weight(),
            generated_at: now,
            decay_hours: self.config.relevance_decay_hours,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
