//! Persistence journeys
//!
//! Snapshots, restarts against a shared store, hydration and retention.

use std::sync::Arc;

use cadence_core::{
    AggregateRange, EngineError, EngineSnapshot, EventStore, Granularity, InMemoryEventStore,
    SNAPSHOT_VERSION,
};
use cadence_e2e_tests::{TestEngineManager, TestEventFactory};

#[tokio::test]
async fn test_snapshot_restore_rolls_back_later_work() {
    let mut harness = TestEngineManager::new(TestEngineManager::scenario_config());
    let now = TestEventFactory::at(10, 0, 0);
    harness
        .ingest_and_cycle(TestEventFactory::create_stress_scenario().events, now)
        .await
        .unwrap();
    harness.take_snapshot();
    let patterns = harness.engine.current_patterns();

    harness
        .ingest_and_cycle(
            TestEventFactory::create_routine_scenario(7).events,
            TestEventFactory::at(11, 0, 0),
        )
        .await
        .unwrap();
    assert_ne!(harness.engine.current_patterns(), patterns);

    assert!(harness.restore_snapshot());
    assert_eq!(harness.engine.current_patterns(), patterns);
    let day = harness
        .engine
        .query_aggregate(
            Granularity::Day,
            AggregateRange::Containing(TestEventFactory::at(0, 0, 0)),
        )
        .unwrap();
    assert_eq!(day.total_count, 1);
}

#[tokio::test]
async fn test_snapshot_survives_json() {
    let harness = TestEngineManager::new(TestEngineManager::scenario_config());
    let now = TestEventFactory::at(14, 12, 0);
    harness
        .ingest_and_cycle(TestEventFactory::create_routine_scenario(14).events, now)
        .await
        .unwrap();

    let json = harness.snapshot_json();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["version"], SNAPSHOT_VERSION);
    assert!(
        value["patterns"]
            .as_array()
            .unwrap()
            .iter()
            .any(|p| p["kind"]["type"] == "timeBased")
    );

    let snapshot = EngineSnapshot::from_json(&json).unwrap();
    assert_eq!(snapshot.version, SNAPSHOT_VERSION);
    assert_eq!(snapshot.taken_at, now);

    let fresh = TestEngineManager::new(TestEngineManager::scenario_config());
    fresh.engine.restore(snapshot).unwrap();
    assert_eq!(fresh.engine.current_patterns(), harness.engine.current_patterns());
    assert_eq!(
        fresh.engine.current_predictions_at(now),
        harness.engine.current_predictions_at(now)
    );
    assert_eq!(
        fresh.engine.current_insights_at(now),
        harness.engine.current_insights_at(now)
    );
}

#[tokio::test]
async fn test_restart_restores_last_stored_snapshot() {
    let store = Arc::new(InMemoryEventStore::new());
    let now = TestEventFactory::at(10, 0, 0);

    let before = {
        let harness =
            TestEngineManager::with_existing_store(TestEngineManager::scenario_config(), store.clone());
        assert!(!harness.engine.restore_from_store().await.unwrap());
        harness
            .ingest_and_cycle(TestEventFactory::create_stress_scenario().events, now)
            .await
            .unwrap();
        harness.engine.current_patterns()
    };
    assert_eq!(store.snapshots_saved(), 1);

    let restarted =
        TestEngineManager::with_existing_store(TestEngineManager::scenario_config(), store);
    assert!(restarted.engine.restore_from_store().await.unwrap());
    assert_eq!(restarted.engine.current_patterns(), before);
    assert_eq!(restarted.engine.stats().last_cycle_at, Some(now));

    // Nothing new since the restored cycle
    assert!(restarted.cycle_at(now).await.unwrap().is_noop());
}

#[tokio::test]
async fn test_hydrate_replays_stored_events() {
    let store = Arc::new(InMemoryEventStore::new());
    let events: Vec<_> = TestEventFactory::create_stress_scenario()
        .events
        .into_iter()
        .map(|e| e.validate().unwrap())
        .collect();
    store.append(&events).await.unwrap();

    let harness =
        TestEngineManager::with_existing_store(TestEngineManager::scenario_config(), store.clone());
    let hydrated = harness
        .engine
        .hydrate_from_store(TestEventFactory::at(0, 0, 0), TestEventFactory::at(30, 0, 0))
        .await
        .unwrap();
    assert_eq!(hydrated, 5);

    // Replaying the same range folds nothing new
    let again = harness
        .engine
        .hydrate_from_store(TestEventFactory::at(0, 0, 0), TestEventFactory::at(30, 0, 0))
        .await
        .unwrap();
    assert_eq!(again, 0);

    harness.cycle_at(TestEventFactory::at(10, 0, 0)).await.unwrap();
    assert!(!harness.engine.current_patterns().is_empty());
    // Hydrated events are not written back
    assert_eq!(store.len().await, 5);
}

#[tokio::test]
async fn test_retention_sweep_drops_old_events_and_buckets() {
    let harness = TestEngineManager::with_store(TestEngineManager::scenario_config());
    harness
        .ingest_and_cycle(
            TestEventFactory::create_stress_scenario().events,
            TestEventFactory::at(10, 0, 0),
        )
        .await
        .unwrap();
    let store = harness.store().unwrap();
    assert_eq!(store.len().await, 5);

    let report = harness
        .engine
        .retention_sweep(TestEventFactory::at(5, 0, 0))
        .await
        .unwrap();
    assert_eq!(report.events_deleted, 3);
    assert_eq!(report.buckets_removed, 3);
    assert_eq!(store.len().await, 2);

    assert!(matches!(
        harness.engine.query_aggregate(
            Granularity::Day,
            AggregateRange::Containing(TestEventFactory::at(2, 0, 0))
        ),
        Err(EngineError::NoDataAvailable { .. })
    ));
    // The week containing the cutoff is still open
    let week = harness
        .engine
        .query_aggregate(
            Granularity::Week,
            AggregateRange::Containing(TestEventFactory::at(2, 0, 0)),
        )
        .unwrap();
    assert_eq!(week.total_count, 3);
}

#[tokio::test]
async fn test_store_operations_need_a_store() {
    let harness = TestEngineManager::new(TestEngineManager::scenario_config());
    assert!(matches!(
        harness.engine.restore_from_store().await,
        Err(EngineError::NoStore)
    ));
    assert!(matches!(
        harness
            .engine
            .hydrate_from_store(TestEventFactory::at(0, 0, 0), TestEventFactory::at(1, 0, 0))
            .await,
        Err(EngineError::NoStore)
    ));

    // Retention still closes in-memory buckets
    harness.submit_all([TestEventFactory::critical(0, 9, 4, &["work"])]);
    let report = harness
        .engine
        .retention_sweep(TestEventFactory::at(40, 0, 0))
        .await
        .unwrap();
    assert_eq!(report.events_deleted, 0);
    assert_eq!(report.buckets_removed, 3);
}
