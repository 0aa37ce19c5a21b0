//! Prediction Module
//!
//! - Projects time-based patterns into their next hour window
//! - Predictions expire by wall-clock comparison at read time
//! - Retrospective scoring against actual events

mod engine;
mod record;

pub use engine::{AccuracyReport, PredictionEngine, PredictionError, PredictionScore};
pub use record::{Prediction, PredictionState};
