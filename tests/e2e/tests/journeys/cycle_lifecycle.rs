//! Cycle lifecycle journeys
//!
//! Publication, idempotence, overlap rejection, cancellation, store
//! failures and prediction expiry.

use std::time::Duration;

use cadence_core::{CancellationToken, EngineConfig, EngineError, PatternKind};
use cadence_e2e_tests::{TestEngineManager, TestEventFactory};

#[tokio::test]
async fn test_repeated_cycles_without_new_events_change_nothing() {
    let harness = TestEngineManager::new(TestEngineManager::scenario_config());
    let now = TestEventFactory::at(10, 0, 0);
    let first = harness
        .ingest_and_cycle(TestEventFactory::create_stress_scenario().events, now)
        .await
        .unwrap();
    assert!(!first.is_noop());

    let patterns = harness.engine.current_patterns();
    let insights = harness.engine.current_insights_at(now);

    for _ in 0..3 {
        let report = harness.cycle_at(now).await.unwrap();
        assert!(report.is_noop());
    }
    assert_eq!(harness.engine.current_patterns(), patterns);
    assert_eq!(harness.engine.current_insights_at(now), insights);
    assert_eq!(harness.engine.stats().cycles_completed, 1);
}

#[tokio::test]
async fn test_reads_only_see_completed_cycles() {
    let harness = TestEngineManager::new(TestEngineManager::scenario_config());
    let scenario = TestEventFactory::create_stress_scenario();
    harness.submit_all(scenario.events);
    harness.engine.flush().unwrap();

    // Folded and queryable, but not yet analyzed
    assert_eq!(harness.engine.stats().events_folded, 5);
    assert!(harness.engine.current_patterns().is_empty());
    assert!(harness.engine.current_insights().is_empty());
    assert!(harness.engine.stats().last_cycle_at.is_none());

    let now = TestEventFactory::at(10, 0, 0);
    harness.cycle_at(now).await.unwrap();
    assert!(!harness.engine.current_patterns().is_empty());
    assert_eq!(harness.engine.stats().last_cycle_at, Some(now));
}

#[tokio::test]
async fn test_overlapping_cycle_is_rejected() {
    let harness = TestEngineManager::with_store(TestEngineManager::scenario_config());
    harness.submit_all(TestEventFactory::create_stress_scenario().events);
    harness
        .store()
        .unwrap()
        .set_latency(Duration::from_millis(200));

    let engine = harness.engine.clone();
    let running = tokio::spawn(async move {
        engine
            .run_cycle_at(&CancellationToken::new(), TestEventFactory::at(10, 0, 0))
            .await
    });

    // Let the first cycle reach the store
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(matches!(
        harness.cycle_at(TestEventFactory::at(10, 0, 0)).await,
        Err(EngineError::AlreadyProcessing)
    ));

    let report = running.await.unwrap().unwrap();
    assert!(!report.is_noop());
    assert_eq!(harness.engine.stats().cycles_completed, 1);
}

#[tokio::test]
async fn test_pattern_born_during_store_handoff_waits_a_full_cycle() {
    let harness = TestEngineManager::with_store(TestEngineManager::scenario_config());
    let store = harness.store().unwrap().clone();
    let now = TestEventFactory::at(10, 0, 0);
    harness.submit_all([TestEventFactory::critical(0, 9, 4, &[])]);
    store.set_latency(Duration::from_millis(200));

    let engine = harness.engine.clone();
    let running =
        tokio::spawn(async move { engine.run_cycle_at(&CancellationToken::new(), now).await });

    // Arrives while the cycle waits on the store
    tokio::time::sleep(Duration::from_millis(50)).await;
    harness.submit_all([TestEventFactory::critical(0, 20, 4, &[])]);
    running.await.unwrap().unwrap();
    store.set_latency(Duration::ZERO);

    // An unrelated event runs the in-flight pruning rules
    harness.submit_all([TestEventFactory::critical(1, 3, 4, &[])]);
    harness.cycle_at(now).await.unwrap();

    let evening = harness
        .engine
        .current_patterns()
        .into_iter()
        .find(|p| matches!(p.kind(), PatternKind::TimeBased { target_hour: 20, .. }))
        .expect("evening pattern kept");
    assert_eq!(evening.observation_count(), 1);
    assert_eq!(evening.cycles_survived(), 0);
}

#[tokio::test]
async fn test_cancelled_cycle_leaves_published_state_alone() {
    let harness = TestEngineManager::new(TestEngineManager::scenario_config());
    let now = TestEventFactory::at(10, 0, 0);
    harness
        .ingest_and_cycle(TestEventFactory::create_stress_scenario().events, now)
        .await
        .unwrap();
    let before = harness.engine.current_patterns();

    harness.submit_all(
        TestEventFactory::create_routine_scenario(3)
            .events
            .into_iter()
            .map(|e| e.with_id(TestEventFactory::unique_id("routine"))),
    );
    let cancel = CancellationToken::new();
    cancel.cancel();
    assert!(matches!(
        harness.engine.run_cycle_at(&cancel, now).await,
        Err(EngineError::Cancelled)
    ));
    assert_eq!(harness.engine.current_patterns(), before);
    assert_eq!(harness.engine.stats().cycles_aborted, 1);

    // The next cycle picks the pending work up
    let report = harness.cycle_at(now).await.unwrap();
    assert!(report.patterns_updated > 0);
    assert_ne!(harness.engine.current_patterns(), before);
}

#[tokio::test]
async fn test_slow_store_times_out_and_keeps_prior_state() {
    let config = EngineConfig {
        store_timeout_ms: 50,
        ..TestEngineManager::scenario_config()
    };
    let harness = TestEngineManager::with_store(config);
    let store = harness.store().unwrap().clone();
    let now = TestEventFactory::at(10, 0, 0);

    harness
        .ingest_and_cycle(TestEventFactory::create_stress_scenario().events, now)
        .await
        .unwrap();
    let before = harness.engine.current_patterns();
    assert_eq!(store.len().await, 5);

    store.set_latency(Duration::from_millis(500));
    harness.submit_all([TestEventFactory::critical(10, 14, 5, &["stress"])]);
    assert!(matches!(
        harness.cycle_at(now).await,
        Err(EngineError::StoreTimeout(_))
    ));
    assert_eq!(harness.engine.current_patterns(), before);

    // Once the store recovers the held-back event is written
    store.set_latency(Duration::ZERO);
    harness.cycle_at(now).await.unwrap();
    assert_eq!(store.len().await, 6);
    assert_ne!(harness.engine.current_patterns(), before);
}

#[tokio::test]
async fn test_unavailable_store_fails_the_cycle() {
    let harness = TestEngineManager::with_store(TestEngineManager::scenario_config());
    let store = harness.store().unwrap().clone();
    store.set_available(false);

    harness.submit_all(TestEventFactory::create_stress_scenario().events);
    assert!(matches!(
        harness.cycle_at(TestEventFactory::at(10, 0, 0)).await,
        Err(EngineError::Store(_))
    ));
    assert!(harness.engine.current_patterns().is_empty());
    assert_eq!(store.snapshots_saved(), 0);
}

#[tokio::test]
async fn test_predictions_expire_after_their_window() {
    let harness = TestEngineManager::new(TestEngineManager::scenario_config());
    let now = TestEventFactory::at(14, 12, 0);
    harness
        .ingest_and_cycle(TestEventFactory::create_routine_scenario(14).events, now)
        .await
        .unwrap();

    let predictions = harness.engine.current_predictions_at(now);
    assert_eq!(predictions.len(), 2);
    let evening = &predictions[0];

    // Still listed exactly at expiry, gone just after
    let at_expiry = harness.engine.current_predictions_at(evening.expires_at);
    assert!(at_expiry.iter().any(|p| p.id == evening.id));

    let after = evening.expires_at + chrono::Duration::seconds(1);
    let remaining = harness.engine.current_predictions_at(after);
    assert!(remaining.iter().all(|p| p.id != evening.id));
    assert_eq!(remaining.len(), 1);

    let much_later = TestEventFactory::at(20, 0, 0);
    assert!(harness.engine.current_predictions_at(much_later).is_empty());
}

#[tokio::test]
async fn test_insight_relevance_fades_with_age() {
    let harness = TestEngineManager::new(TestEngineManager::scenario_config());
    let now = TestEventFactory::at(10, 0, 0);
    harness
        .ingest_and_cycle(TestEventFactory::create_stress_scenario().events, now)
        .await
        .unwrap();

    let fresh = harness.engine.current_insights_at(now);
    let day_later = harness
        .engine
        .current_insights_at(now + chrono::Duration::hours(24));
    assert_eq!(fresh.len(), day_later.len());
    for insight in &day_later {
        let original = fresh.iter().find(|i| i.id == insight.id).unwrap();
        assert!(insight.relevance_score < original.relevance_score);
        assert_eq!(insight.confidence, original.confidence);
    }
}
