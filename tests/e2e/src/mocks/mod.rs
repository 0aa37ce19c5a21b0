//! Test data

mod fixtures;

pub use fixtures::{BatchConfig, TestEventFactory, TestScenario};
