//! Insights Module
//!
//! Human-facing summaries of confident patterns:
//! - Warning, trigger-correlation and time-of-day insights
//! - Relevance that decays with wall-clock age, recomputed on read
//! - Validation before anything is surfaced

mod generator;
mod insight;

pub use generator::InsightGenerator;
pub use insight::{DEFAULT_RELEVANCE_DECAY_HOURS, Insight, InsightError, InsightKind};
