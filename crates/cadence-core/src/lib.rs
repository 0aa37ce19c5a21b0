//! # Cadence Core
//!
//! Temporal behavioral-pattern analytics. Cadence ingests timestamped events
//! with an intensity and contextual tags, and turns them into:
//!
//! - **Time Buckets**: day, ISO-week and month aggregates with hour/weekday
//!   histograms and tag frequencies, folded commutatively
//! - **Patterns**: time-of-day and trigger-tag regularities whose confidence
//!   rewards strength, frequency and durability together
//! - **Insights**: ranked, validated summaries with relevance that decays
//!   with wall-clock age
//! - **Predictions**: projected hour windows that expire on their own and can
//!   be scored against what actually happened
//!
//! ## Pipeline
//!
//! Critical events are folded before `submit` returns. Everything else is
//! batched and released when the batch fills or the flush interval elapses.
//! Aggregation of a batch runs in parallel; pattern updates follow submission
//! order. A cycle (`run_cycle`) prunes patterns, regenerates insights and
//! predictions, hands a snapshot to the store and publishes the result.
//! Readers always see the last completed cycle.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cadence_core::prelude::*;
//!
//! let engine = AnalyticsEngine::new(EngineConfig::default())?;
//!
//! engine.submit(
//!     EventInput::new(Utc::now(), 6)
//!         .with_tags(["stress", "work"])
//!         .with_priority(Priority::High),
//! )?;
//!
//! let report = engine.run_cycle(&CancellationToken::new()).await?;
//! for insight in engine.current_insights() {
//!     println!("{} ({:.2})", insight.title, insight.relevance_score);
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod aggregate;
pub mod cancel;
pub mod config;
pub mod engine;
pub mod event;
pub mod insights;
pub mod patterns;
pub mod prediction;
pub mod queue;
pub mod snapshot;
pub mod store;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use aggregate::{
    AggregateSnapshot, AggregationError, Aggregator, BatchFold, BucketKey, FoldOutcome,
    Granularity, TimeBucket,
};
pub use cancel::CancellationToken;
pub use config::{
    ConfigError, EngineConfig, InsightConfig, PatternConfig, PredictionConfig, QueueConfig,
};
pub use engine::{
    AggregateRange, AnalyticsEngine, CycleReport, EngineError, EngineStats, Result,
    RetentionReport,
};
pub use event::{Event, EventInput, Priority, ValidationError};
pub use insights::{Insight, InsightError, InsightGenerator, InsightKind};
pub use patterns::{Pattern, PatternEngine, PatternKind, ProcessReport};
pub use prediction::{
    AccuracyReport, Prediction, PredictionEngine, PredictionError, PredictionScore,
    PredictionState,
};
pub use queue::{BatchScheduler, BatchSink, Emission, EventQueue, FlushReason, QueueError, QueueStats, SubmitOutcome};
pub use snapshot::{EngineSnapshot, SNAPSHOT_VERSION};
pub use store::{EventStore, InMemoryEventStore, StoreError};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        AggregateRange, AnalyticsEngine, CancellationToken, CycleReport, EngineConfig,
        EngineError, EventInput, Granularity, Insight, Pattern, Prediction, Priority, Result,
    };
    pub use chrono::Utc;
}
