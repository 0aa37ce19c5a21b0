//! Test Engine Manager
//!
//! Builds isolated engines for end-to-end tests, optionally backed by an
//! in-memory store whose latency and availability the test controls.

use std::sync::Arc;

use cadence_core::{
    AnalyticsEngine, CancellationToken, CycleReport, EngineConfig, EngineError, EngineSnapshot,
    EventInput, InMemoryEventStore, PatternConfig, QueueConfig, SubmitOutcome,
};
use chrono::{DateTime, Utc};

/// Manager for test engines
///
/// Each manager owns its own engine and store, so tests never share state.
///
/// # Example
///
/// ```rust,ignore
/// let harness = TestEngineManager::with_store(TestEngineManager::scenario_config());
///
/// harness.submit_all(scenario.events);
/// let report = harness.cycle_at(now).await?;
///
/// harness.store().unwrap().set_available(false);
/// ```
pub struct TestEngineManager {
    /// The engine under test
    pub engine: Arc<AnalyticsEngine>,
    /// Store handed to the engine, if any
    store: Option<Arc<InMemoryEventStore>>,
    /// Snapshot data for restore operations
    snapshot: Option<EngineSnapshot>,
}

impl TestEngineManager {
    /// Engine without a store
    pub fn new(config: EngineConfig) -> Self {
        let engine = AnalyticsEngine::new(config).expect("Failed to create test engine");
        Self {
            engine: Arc::new(engine),
            store: None,
            snapshot: None,
        }
    }

    /// Engine backed by a fresh in-memory store
    pub fn with_store(config: EngineConfig) -> Self {
        let store = Arc::new(InMemoryEventStore::new());
        let engine = AnalyticsEngine::with_store(config, store.clone())
            .expect("Failed to create test engine");
        Self {
            engine: Arc::new(engine),
            store: Some(store),
            snapshot: None,
        }
    }

    /// Engine sharing an existing store, as after a restart
    pub fn with_existing_store(config: EngineConfig, store: Arc<InMemoryEventStore>) -> Self {
        let engine = AnalyticsEngine::with_store(config, store.clone())
            .expect("Failed to create test engine");
        Self {
            engine: Arc::new(engine),
            store: Some(store),
            snapshot: None,
        }
    }

    /// Defaults with saturation tuned for week-long scenarios
    ///
    /// Five observations spread over a week reach full confidence.
    pub fn scenario_config() -> EngineConfig {
        EngineConfig {
            queue: QueueConfig {
                batch_size: 8,
                flush_interval_secs: 30,
            },
            patterns: PatternConfig {
                frequency_saturation: 5,
                span_saturation_secs: 7 * 24 * 3600,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn store(&self) -> Option<&Arc<InMemoryEventStore>> {
        self.store.as_ref()
    }

    // ========================================================================
    // DRIVING
    // ========================================================================

    /// Submit every input, panicking on the first rejection
    pub fn submit_all(&self, inputs: impl IntoIterator<Item = EventInput>) -> Vec<SubmitOutcome> {
        inputs
            .into_iter()
            .map(|input| self.engine.submit(input).expect("Event rejected"))
            .collect()
    }

    /// Run a cycle as of `now` with a fresh cancellation token
    pub async fn cycle_at(&self, now: DateTime<Utc>) -> Result<CycleReport, EngineError> {
        self.engine
            .run_cycle_at(&CancellationToken::new(), now)
            .await
    }

    /// Submit `inputs` and run one cycle as of `now`
    pub async fn ingest_and_cycle(
        &self,
        inputs: impl IntoIterator<Item = EventInput>,
        now: DateTime<Utc>,
    ) -> Result<CycleReport, EngineError> {
        self.submit_all(inputs);
        self.cycle_at(now).await
    }

    // ========================================================================
    // SNAPSHOT/RESTORE
    // ========================================================================

    /// Take a snapshot of current engine state
    pub fn take_snapshot(&mut self) {
        self.snapshot = Some(self.engine.snapshot());
    }

    /// Restore the last snapshot taken; false when there is none
    pub fn restore_snapshot(&self) -> bool {
        match &self.snapshot {
            Some(snapshot) => self.engine.restore(snapshot.clone()).is_ok(),
            None => false,
        }
    }

    /// Snapshot serialized as JSON
    pub fn snapshot_json(&self) -> String {
        self.engine
            .snapshot()
            .to_json()
            .expect("Snapshot serialization failed")
    }

    /// Check if the engine has folded anything
    pub fn is_empty(&self) -> bool {
        self.engine.stats().events_folded == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_config_is_valid() {
        assert!(TestEngineManager::scenario_config().validate().is_ok());
    }

    #[test]
    fn test_new_manager_is_empty() {
        let harness = TestEngineManager::new(TestEngineManager::scenario_config());
        assert!(harness.is_empty());
        assert!(harness.store().is_none());
    }
}
