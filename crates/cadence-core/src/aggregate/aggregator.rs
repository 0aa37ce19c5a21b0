//! Aggregator
//!
//! Folds events into day, week and month buckets. Buckets live in a sharded
//! map so that concurrent folds only contend when they touch the same bucket.
//! Every fallible computation (bucket keys) happens before anything is
//! mutated, so a rejected event leaves no trace.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::bucket::{BucketKey, Granularity, TimeBucket};
use crate::event::Event;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregationError {
    #[error("Cannot compute {granularity} bucket for {timestamp}")]
    KeyOutOfRange {
        granularity: Granularity,
        timestamp: DateTime<Utc>,
    },
}

// ============================================================================
// RESULTS
// ============================================================================

/// Result of folding a single event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldOutcome {
    Folded,
    /// Already folded earlier; ignored
    Duplicate,
}

/// Result of folding a batch
#[derive(Debug, Clone, Default)]
pub struct BatchFold {
    /// Ids folded for the first time by this batch
    pub folded: HashSet<String>,
    pub duplicates: usize,
    /// Events skipped because their fold failed
    pub failures: Vec<(String, AggregationError)>,
}

/// Buckets of one granularity over a range, with totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateSnapshot {
    pub granularity: Granularity,
    pub range_start: DateTime<Utc>,
    pub range_end: DateTime<Utc>,
    /// Buckets ordered by start
    pub buckets: Vec<TimeBucket>,
    pub total_count: u64,
    pub total_intensity: u64,
    pub mean_intensity: f64,
}

impl AggregateSnapshot {
    /// Summarize `buckets`; `None` when the range holds no buckets
    pub fn from_buckets(
        granularity: Granularity,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
        buckets: Vec<TimeBucket>,
    ) -> Option<Self> {
        if buckets.is_empty() {
            return None;
        }
        let total_count: u64 = buckets.iter().map(|b| b.count).sum();
        let total_intensity: u64 = buckets.iter().map(|b| b.intensity_sum).sum();
        let mean_intensity = if total_count == 0 {
            0.0
        } else {
            total_intensity as f64 / total_count as f64
        };
        Some(Self {
            granularity,
            range_start,
            range_end,
            buckets,
            total_count,
            total_intensity,
            mean_intensity,
        })
    }
}

// ============================================================================
// AGGREGATOR
// ============================================================================

/// Concurrent bucket store
#[derive(Debug, Default)]
pub struct Aggregator {
    buckets: DashMap<BucketKey, TimeBucket>,
    /// Folded event ids with their timestamps, for exactly-once folding
    folded: DashMap<String, DateTime<Utc>>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into its day, week and month buckets
    pub fn fold(&self, event: &Event) -> Result<FoldOutcome, AggregationError> {
        let timestamp = event.timestamp();
        let mut keys = [None; 3];
        for (slot, granularity) in keys.iter_mut().zip(Granularity::ALL) {
            *slot = Some(BucketKey::containing(granularity, timestamp).ok_or(
                AggregationError::KeyOutOfRange {
                    granularity,
                    timestamp,
                },
            )?);
        }

        match self.folded.entry(event.id().to_string()) {
            Entry::Occupied(_) => return Ok(FoldOutcome::Duplicate),
            Entry::Vacant(slot) => {
                slot.insert(timestamp);
            }
        }

        for key in keys.into_iter().flatten() {
            self.buckets
                .entry(key)
                .or_insert_with(|| TimeBucket::new(key))
                .apply(event);
        }

        Ok(FoldOutcome::Folded)
    }

    /// Fold a batch in parallel; failures are logged and skipped
    pub fn fold_batch(&self, events: &[Event]) -> BatchFold {
        let outcomes: Vec<(String, Result<FoldOutcome, AggregationError>)> = events
            .par_iter()
            .map(|e| (e.id().to_string(), self.fold(e)))
            .collect();

        let mut report = BatchFold::default();
        for (id, outcome) in outcomes {
            match outcome {
                Ok(FoldOutcome::Folded) => {
                    report.folded.insert(id);
                }
                Ok(FoldOutcome::Duplicate) => {
                    debug!(event_id = %id, "Ignoring already-folded event");
                    report.duplicates += 1;
                }
                Err(e) => {
                    warn!(event_id = %id, error = %e, "Skipping event that failed to aggregate");
                    report.failures.push((id, e));
                }
            }
        }
        report
    }

    /// Buckets with `start <= key < end`, ordered by key
    pub fn query(
        &self,
        granularity: Granularity,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<TimeBucket> {
        let mut buckets: Vec<TimeBucket> = self
            .buckets
            .iter()
            .filter(|entry| {
                let key = entry.key();
                key.granularity == granularity && key.start >= start && key.start < end
            })
            .map(|entry| entry.value().clone())
            .collect();
        buckets.sort_by_key(|b| b.start);
        buckets
    }

    /// The bucket containing `instant`, if any event landed in it
    pub fn bucket_containing(
        &self,
        granularity: Granularity,
        instant: DateTime<Utc>,
    ) -> Option<TimeBucket> {
        let key = BucketKey::containing(granularity, instant)?;
        self.buckets.get(&key).map(|b| b.value().clone())
    }

    /// Copy of every bucket, ordered by key
    pub fn snapshot(&self) -> Vec<TimeBucket> {
        let mut buckets: Vec<TimeBucket> = self.buckets.iter().map(|b| b.value().clone()).collect();
        buckets.sort_by_key(|b| b.key());
        buckets
    }

    /// Copy of every bucket of one granularity, ordered by start
    pub fn snapshot_of(&self, granularity: Granularity) -> Vec<TimeBucket> {
        let mut buckets: Vec<TimeBucket> = self
            .buckets
            .iter()
            .filter(|b| b.key().granularity == granularity)
            .map(|b| b.value().clone())
            .collect();
        buckets.sort_by_key(|b| b.start);
        buckets
    }

    /// Events folded so far (sum of daily counts)
    pub fn total_events(&self) -> u64 {
        self.buckets
            .iter()
            .filter(|b| b.key().granularity == Granularity::Day)
            .map(|b| b.value().count)
            .sum()
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Retention sweep: drop buckets whose period ended at or before `cutoff`
    pub fn sweep_before(&self, cutoff: DateTime<Utc>) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|key, _| match key.granularity.bucket_end(key.start) {
            Some(end) => end > cutoff,
            None => true,
        });
        self.folded.retain(|_, ts| *ts >= cutoff);
        let removed = before.saturating_sub(self.buckets.len());
        debug!(removed, %cutoff, "Retention sweep");
        removed
    }

    /// Replace all buckets (snapshot restore)
    ///
    /// Fold history is not part of a snapshot, so duplicate detection only
    /// covers events folded after the restore.
    pub fn restore(&self, buckets: Vec<TimeBucket>) {
        self.buckets.clear();
        self.folded.clear();
        for bucket in buckets {
            self.buckets.insert(bucket.key(), bucket);
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
