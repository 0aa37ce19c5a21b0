//! Pattern Detection Module
//!
//! Infers recurring regularities from the event stream:
//! - Time-based patterns (events cluster around an hour of day)
//! - Trigger-based patterns (events share contextual tags)
//! - Confidence from strength, frequency and span
//! - Candidate proposal, pruning and a hard cap on the pattern count

mod engine;
mod pattern;

pub use engine::{PatternEngine, ProcessReport};
pub use pattern::{Pattern, PatternKind, hour_distance};
