//! Aggregation Module
//!
//! Folds events into fixed-granularity time buckets:
//! - Day, ISO week (Monday start) and month buckets, keyed in UTC
//! - Counts, intensity sums, hour/weekday histograms, tag frequencies
//! - Half-open range queries and retention sweeps

mod aggregator;
mod bucket;

pub use aggregator::{AggregateSnapshot, AggregationError, Aggregator, BatchFold, FoldOutcome};
pub use bucket::{BucketKey, Granularity, TimeBucket, weekday_name};
