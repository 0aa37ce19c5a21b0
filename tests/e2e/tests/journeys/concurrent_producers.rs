//! Concurrency journeys
//!
//! Several producers submitting while cycles run.

use std::sync::Arc;

use cadence_core::{
    AggregateRange, AnalyticsEngine, CancellationToken, EngineError, EventInput, Granularity,
    Priority,
};
use cadence_e2e_tests::{BatchConfig, TestEngineManager, TestEventFactory};

const PRODUCERS: usize = 6;
const PER_PRODUCER: usize = 120;

fn producer_events(producer: usize) -> Vec<EventInput> {
    TestEventFactory::create_batch_with_config(BatchConfig {
        count: PER_PRODUCER,
        id_prefix: format!("producer-{}", producer),
        spacing_minutes: 37 + producer as i64,
        priority: if producer % 3 == 0 {
            Priority::Critical
        } else {
            Priority::Normal
        },
        ..Default::default()
    })
}

async fn produce(engine: Arc<AnalyticsEngine>, producer: usize) {
    for input in producer_events(producer) {
        engine.submit(input).unwrap();
        tokio::task::yield_now().await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_every_event_is_folded_exactly_once() {
    let harness = TestEngineManager::new(TestEngineManager::scenario_config());

    let handles: Vec<_> = (0..PRODUCERS)
        .map(|p| tokio::spawn(produce(harness.engine.clone(), p)))
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }
    harness.engine.flush().unwrap();

    let total = (PRODUCERS * PER_PRODUCER) as u64;
    let stats = harness.engine.stats();
    assert_eq!(stats.events_folded, total);
    assert_eq!(stats.queue.submitted, total);
    assert_eq!(stats.queue.pending, 0);

    let all = harness
        .engine
        .query_aggregate(
            Granularity::Month,
            AggregateRange::Between(TestEventFactory::at(-31, 0, 0), TestEventFactory::at(400, 0, 0)),
        )
        .unwrap();
    assert_eq!(all.total_count, total);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cycles_interleaved_with_producers() {
    let harness = TestEngineManager::new(TestEngineManager::scenario_config());
    let now = TestEventFactory::at(60, 0, 0);

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| tokio::spawn(produce(harness.engine.clone(), p)))
        .collect();

    let cyclers: Vec<_> = (0..3)
        .map(|_| {
            let engine = harness.engine.clone();
            tokio::spawn(async move {
                let mut completed = 0;
                for _ in 0..5 {
                    match engine.run_cycle_at(&CancellationToken::new(), now).await {
                        Ok(_) => completed += 1,
                        Err(EngineError::AlreadyProcessing) => {}
                        Err(e) => panic!("unexpected cycle error: {}", e),
                    }
                    tokio::task::yield_now().await;
                }
                completed
            })
        })
        .collect();

    for handle in producers {
        handle.await.unwrap();
    }
    for handle in cyclers {
        handle.await.unwrap();
    }

    // A final cycle picks up whatever arrived after the last one
    harness.cycle_at(now).await.unwrap();
    assert!(harness.cycle_at(now).await.unwrap().is_noop());

    let config = harness.engine.config().patterns.clone();
    let patterns = harness.engine.current_patterns();
    assert!(patterns.len() <= config.maximum_patterns);
    for pattern in &patterns {
        assert!((0.0..=1.0).contains(&pattern.confidence()));
        if pattern.observation_count() >= config.minimum_observations {
            assert!(pattern.confidence() >= config.minimum_confidence);
        }
    }

    let stats = harness.engine.stats();
    assert_eq!(stats.events_folded, (PRODUCERS * PER_PRODUCER) as u64);
    assert!(stats.cycles_completed >= 1);
    assert_eq!(stats.cycles_aborted, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_see_consistent_snapshots_during_cycles() {
    let harness = TestEngineManager::new(TestEngineManager::scenario_config());
    let now = TestEventFactory::at(14, 12, 0);
    harness
        .ingest_and_cycle(TestEventFactory::create_routine_scenario(14).events, now)
        .await
        .unwrap();

    let reader = {
        let engine = harness.engine.clone();
        tokio::spawn(async move {
            for _ in 0..200 {
                let patterns = engine.current_patterns();
                let mut ids: Vec<&str> = patterns.iter().map(|p| p.id()).collect();
                ids.sort_unstable();
                ids.dedup();
                assert_eq!(ids.len(), patterns.len());
                tokio::task::yield_now().await;
            }
        })
    };

    produce(harness.engine.clone(), 1).await;
    harness.cycle_at(now).await.unwrap();
    reader.await.unwrap();
}
