//! Analytics Engine
//!
//! Owns the pipeline and exposes the public surface:
//!
//! ```text
//! submit ─► EventQueue ─► (critical: now | batch: on size/interval)
//!                │
//!                ▼
//!           Pipeline ─► Aggregator (parallel fold) ─► PatternEngine (in order)
//!
//! run_cycle ─► prune ─► insights ─► predictions ─► store ─► publish
//! ```
//!
//! Readers only ever see the state published by the last completed cycle.
//! A cycle that fails or is cancelled publishes nothing, so callers get
//! stale-but-consistent results rather than half-updated ones.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::aggregate::{AggregateSnapshot, Aggregator, BucketKey, Granularity};
use crate::cancel::CancellationToken;
use crate::config::{ConfigError, EngineConfig};
use crate::event::{Event, EventInput, ValidationError};
use crate::insights::{Insight, InsightError, InsightGenerator};
use crate::patterns::{Pattern, PatternEngine};
use crate::prediction::{AccuracyReport, Prediction, PredictionEngine, PredictionError, PredictionState};
use crate::queue::{BatchSink, EventQueue, QueueError, QueueStats, SubmitOutcome};
use crate::snapshot::EngineSnapshot;
use crate::store::{EventStore, StoreError};

/// Upper bound on the interval-flush polling period
const MAX_FLUSH_TICK: Duration = Duration::from_secs(1);

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid event: {0}")]
    Validation(#[from] ValidationError),

    #[error("Insufficient data: {available} events, need {required}")]
    InsufficientData { available: u64, required: u64 },

    #[error("A cycle is already in progress")]
    AlreadyProcessing,

    #[error("No {granularity} data between {start} and {end}")]
    NoDataAvailable {
        granularity: Granularity,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Cycle cancelled")]
    Cancelled,

    #[error("Store did not respond within {0:?}")]
    StoreTimeout(Duration),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("No event store configured")]
    NoStore,

    #[error("Prediction failed: {0}")]
    Prediction(String),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("Background task failed: {0}")]
    TaskFailed(String),
}

impl From<QueueError> for EngineError {
    fn from(e: QueueError) -> Self {
        match e {
            QueueError::Validation(v) => EngineError::Validation(v),
            QueueError::LockPoisoned(m) => EngineError::LockPoisoned(m),
        }
    }
}

impl From<PredictionError> for EngineError {
    fn from(e: PredictionError) -> Self {
        match e {
            PredictionError::InsufficientData {
                available,
                required,
            } => EngineError::InsufficientData {
                available,
                required,
            },
            other => EngineError::Prediction(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

// ============================================================================
// PUBLIC TYPES
// ============================================================================

/// Range argument of [`AnalyticsEngine::query_aggregate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateRange {
    /// Buckets with `start <= key < end`
    Between(DateTime<Utc>, DateTime<Utc>),
    /// The single bucket containing this instant
    Containing(DateTime<Utc>),
}

/// Outcome of one cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    /// Patterns observed or created since the previous cycle
    pub patterns_updated: usize,
    pub patterns_pruned: usize,
    pub insights_generated: usize,
    pub predictions_generated: usize,
    /// Events that failed to aggregate since the previous cycle
    pub events_skipped: u64,
    pub duration_ms: u64,
}

impl CycleReport {
    /// Nothing happened
    pub fn is_noop(&self) -> bool {
        *self == CycleReport::default()
    }
}

/// Result of a retention sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionReport {
    pub events_deleted: usize,
    pub buckets_removed: usize,
}

/// Engine counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
    pub queue: QueueStats,
    pub events_folded: u64,
    pub events_skipped: u64,
    pub cycles_completed: u64,
    pub cycles_aborted: u64,
    pub live_patterns: usize,
    pub buckets: usize,
    pub prediction_state: PredictionState,
    pub last_cycle_at: Option<DateTime<Utc>>,
}

// ============================================================================
// PIPELINE
// ============================================================================

/// Batch consumer: aggregation in parallel, then pattern updates in order
#[derive(Debug)]
struct Pipeline {
    aggregator: Arc<Aggregator>,
    patterns: Arc<PatternEngine>,
    /// Collect folded events for the store
    persist: bool,
    unpersisted: Mutex<Vec<Event>>,
    events_since_cycle: AtomicU64,
    skipped_since_cycle: AtomicU64,
    events_folded: AtomicU64,
    events_skipped: AtomicU64,
}

impl Pipeline {
    fn new(aggregator: Arc<Aggregator>, patterns: Arc<PatternEngine>, persist: bool) -> Self {
        Self {
            aggregator,
            patterns,
            persist,
            unpersisted: Mutex::new(Vec::new()),
            events_since_cycle: AtomicU64::new(0),
            skipped_since_cycle: AtomicU64::new(0),
            events_folded: AtomicU64::new(0),
            events_skipped: AtomicU64::new(0),
        }
    }

    /// Fold a batch; returns how many events were new
    fn ingest(&self, batch: Vec<Event>, persist: bool) -> usize {
        let fold = self.aggregator.fold_batch(&batch);
        let mut fresh = fold.folded;
        let skipped = fold.failures.len() as u64;

        // Patterns see each newly folded event once, in submission order
        let accepted: Vec<Event> = batch.into_iter().filter(|e| fresh.remove(e.id())).collect();
        let report = self.patterns.process_batch(&accepted);

        let count = accepted.len();
        self.events_since_cycle.fetch_add(count as u64, Ordering::AcqRel);
        self.events_folded.fetch_add(count as u64, Ordering::Relaxed);
        if skipped > 0 {
            self.skipped_since_cycle.fetch_add(skipped, Ordering::AcqRel);
            self.events_skipped.fetch_add(skipped, Ordering::Relaxed);
        }

        debug!(
            folded = count,
            duplicates = fold.duplicates,
            skipped,
            observations = report.observations,
            created = report.created.len(),
            evicted = report.evicted,
            "Ingested batch"
        );

        if persist && self.persist && !accepted.is_empty() {
            self.unpersisted
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .extend(accepted);
        }
        count
    }

    fn take_unpersisted(&self) -> Vec<Event> {
        std::mem::take(&mut *self.unpersisted.lock().unwrap_or_else(|e| e.into_inner()))
    }

    fn discard_unpersisted(&self) -> usize {
        self.take_unpersisted().len()
    }

    /// Put events back after a failed hand-off, ahead of newer ones
    fn return_unpersisted(&self, mut events: Vec<Event>) {
        if events.is_empty() {
            return;
        }
        let mut pending = self.unpersisted.lock().unwrap_or_else(|e| e.into_inner());
        events.append(&mut pending);
        *pending = events;
    }
}

impl BatchSink for Pipeline {
    fn dispatch(&self, batch: Vec<Event>) {
        self.ingest(batch, true);
    }
}

/// State visible to readers
#[derive(Debug, Default)]
struct Published {
    patterns: Vec<Pattern>,
    insights: Vec<Insight>,
    predictions: Vec<Prediction>,
    prediction_state: PredictionState,
    cycle_at: Option<DateTime<Utc>>,
}

/// Clears the in-flight flag when a cycle ends, however it ends
struct CycleGuard<'a>(&'a AtomicBool);

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ============================================================================
// ENGINE
// ============================================================================

/// Temporal pattern analytics over a stream of events
pub struct AnalyticsEngine {
    config: EngineConfig,
    pipeline: Arc<Pipeline>,
    queue: Arc<EventQueue>,
    insights: InsightGenerator,
    predictions: PredictionEngine,
    store: Option<Arc<dyn EventStore>>,
    published: RwLock<Arc<Published>>,
    cycle_in_flight: AtomicBool,
    cycles_completed: AtomicU64,
    cycles_aborted: AtomicU64,
}

impl std::fmt::Debug for AnalyticsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyticsEngine")
            .field("config", &self.config)
            .field("has_store", &self.store.is_some())
            .field("cycles_completed", &self.cycles_completed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl AnalyticsEngine {
    /// Engine without persistence
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::build(config, None)
    }

    /// Engine that hands events and snapshots to `store` each cycle
    pub fn with_store(config: EngineConfig, store: Arc<dyn EventStore>) -> Result<Self> {
        Self::build(config, Some(store))
    }

    fn build(config: EngineConfig, store: Option<Arc<dyn EventStore>>) -> Result<Self> {
        config.validate()?;

        let aggregator = Arc::new(Aggregator::new());
        let patterns = Arc::new(PatternEngine::new(config.patterns.clone()));
        let pipeline = Arc::new(Pipeline::new(aggregator, patterns, store.is_some()));
        let sink: Arc<dyn BatchSink> = pipeline.clone();
        let queue = Arc::new(EventQueue::new(&config.queue, sink));

        info!(
            batch_size = config.queue.batch_size,
            flush_interval_secs = config.queue.flush_interval_secs,
            max_patterns = config.patterns.maximum_patterns,
            persistent = store.is_some(),
            "Analytics engine initialized"
        );

        Ok(Self {
            insights: InsightGenerator::new(config.insights.clone()),
            predictions: PredictionEngine::new(config.predictions.clone()),
            config,
            pipeline,
            queue,
            store,
            published: RwLock::new(Arc::new(Published::default())),
            cycle_in_flight: AtomicBool::new(false),
            cycles_completed: AtomicU64::new(0),
            cycles_aborted: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ========================================================================
    // INGRESS
    // ========================================================================

    /// Validate and admit an event
    pub fn submit(&self, input: EventInput) -> Result<SubmitOutcome> {
        Ok(self.queue.submit(input)?)
    }

    /// Release buffered events now
    pub fn flush(&self) -> Result<usize> {
        Ok(self.queue.flush()?.map(|e| e.size).unwrap_or(0))
    }

    /// Background task releasing partial batches on the flush interval
    pub fn spawn_interval_flush(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let tick = self.config.queue.flush_interval().min(MAX_FLUSH_TICK);
        self.queue.spawn_interval_flush(tick, cancel)
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// Buckets of `granularity` over `range`
    pub fn query_aggregate(
        &self,
        granularity: Granularity,
        range: AggregateRange,
    ) -> Result<AggregateSnapshot> {
        let (start, end) = match range {
            AggregateRange::Between(start, end) => (start, end),
            AggregateRange::Containing(instant) => {
                let key = BucketKey::containing(granularity, instant).ok_or(
                    EngineError::NoDataAvailable {
                        granularity,
                        start: instant,
                        end: instant,
                    },
                )?;
                let end = granularity.bucket_end(key.start).unwrap_or(key.start);
                (key.start, end)
            }
        };

        let buckets = self.pipeline.aggregator.query(granularity, start, end);
        AggregateSnapshot::from_buckets(granularity, start, end, buckets).ok_or(
            EngineError::NoDataAvailable {
                granularity,
                start,
                end,
            },
        )
    }

    fn published(&self) -> Arc<Published> {
        let guard = self.published.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Patterns as of the last completed cycle
    pub fn current_patterns(&self) -> Vec<Pattern> {
        self.published().patterns.clone()
    }

    pub fn current_insights(&self) -> Vec<Insight> {
        self.current_insights_at(Utc::now())
    }

    /// Insights with relevance recomputed for `now`, most relevant first
    pub fn current_insights_at(&self, now: DateTime<Utc>) -> Vec<Insight> {
        let mut insights: Vec<Insight> = self
            .published()
            .insights
            .iter()
            .map(|i| i.refreshed(now))
            .collect();
        insights.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        insights
    }

    pub fn current_predictions(&self) -> Vec<Prediction> {
        self.current_predictions_at(Utc::now())
    }

    /// Predictions not yet expired at `now`
    pub fn current_predictions_at(&self, now: DateTime<Utc>) -> Vec<Prediction> {
        self.published()
            .predictions
            .iter()
            .filter(|p| !p.is_expired_at(now))
            .cloned()
            .collect()
    }

    /// Project the working pattern set without publishing anything
    pub fn predict_at(&self, now: DateTime<Utc>) -> Result<Vec<Prediction>> {
        let patterns = self.pipeline.patterns.snapshot();
        let data_points = self.pipeline.aggregator.total_events();
        Ok(self.predictions.predict(&patterns, data_points, now)?)
    }

    /// `Generating` while a cycle runs, otherwise the outcome published by
    /// the last completed cycle
    pub fn prediction_state(&self) -> PredictionState {
        if self.cycle_in_flight.load(Ordering::Acquire) {
            PredictionState::Generating
        } else {
            self.published().prediction_state
        }
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            queue: self.queue.stats(),
            events_folded: self.pipeline.events_folded.load(Ordering::Relaxed),
            events_skipped: self.pipeline.events_skipped.load(Ordering::Relaxed),
            cycles_completed: self.cycles_completed.load(Ordering::Relaxed),
            cycles_aborted: self.cycles_aborted.load(Ordering::Relaxed),
            live_patterns: self.pipeline.patterns.len(),
            buckets: self.pipeline.aggregator.bucket_count(),
            prediction_state: self.prediction_state(),
            last_cycle_at: self.published().cycle_at,
        }
    }

    // ========================================================================
    // CYCLE
    // ========================================================================

    pub async fn run_cycle(&self, cancel: &CancellationToken) -> Result<CycleReport> {
        self.run_cycle_at(cancel, Utc::now()).await
    }

    /// Run a cycle as of `now`
    ///
    /// Rejects with `AlreadyProcessing` while another cycle is in flight.
    /// Without new events since the last completed cycle this is a no-op
    /// returning an all-zero report.
    pub async fn run_cycle_at(
        &self,
        cancel: &CancellationToken,
        now: DateTime<Utc>,
    ) -> Result<CycleReport> {
        if self
            .cycle_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(EngineError::AlreadyProcessing);
        }
        let _guard = CycleGuard(&self.cycle_in_flight);

        match self.cycle(cancel, now).await {
            Ok(report) => Ok(report),
            Err(e) => {
                self.cycles_aborted.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Cycle aborted; published state unchanged");
                Err(e)
            }
        }
    }

    async fn cycle(&self, cancel: &CancellationToken, now: DateTime<Utc>) -> Result<CycleReport> {
        let started = Instant::now();
        self.queue.flush()?;

        let new_events = self.pipeline.events_since_cycle.load(Ordering::Acquire);
        let skipped = self.pipeline.skipped_since_cycle.load(Ordering::Acquire);
        if new_events == 0 && skipped == 0 {
            debug!("No new events since last cycle");
            return Ok(CycleReport::default());
        }
        check(cancel)?;

        let patterns = &self.pipeline.patterns;
        let pruned = patterns.prune_at_cycle_boundary();
        let updated = patterns.updated_since_cycle();
        let pattern_set = patterns.snapshot();
        let analyzed: HashSet<String> = pattern_set.iter().map(|p| p.id().to_string()).collect();
        check(cancel)?;

        let daily = self.pipeline.aggregator.snapshot_of(Granularity::Day);
        let insights = match self.insights.generate(&pattern_set, &daily, now) {
            Ok(insights) => insights,
            Err(InsightError::InsufficientData {
                available,
                required,
            }) => {
                debug!(available, required, "Too little data for insights");
                Vec::new()
            }
            Err(e) => {
                warn!(error = %e, "Insight generation failed");
                Vec::new()
            }
        };
        check(cancel)?;

        let data_points = self.pipeline.aggregator.total_events();
        let outcome = self.predictions.predict(&pattern_set, data_points, now);
        let prediction_state = PredictionEngine::state_of(&outcome);
        let predictions = match outcome {
            Ok(predictions) => predictions,
            Err(PredictionError::InsufficientData { .. }) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "Prediction generation failed");
                Vec::new()
            }
        };
        check(cancel)?;

        if let Some(store) = &self.store {
            let snapshot = EngineSnapshot::new(
                now,
                self.pipeline.aggregator.snapshot(),
                pattern_set.clone(),
                insights.clone(),
                predictions.clone(),
            )
            .with_prediction_state(prediction_state);
            self.persist(store.as_ref(), &snapshot).await?;
        }
        check(cancel)?;

        let report = CycleReport {
            patterns_updated: updated.len(),
            patterns_pruned: pruned,
            insights_generated: insights.len(),
            predictions_generated: predictions.len(),
            events_skipped: skipped,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        {
            let mut published = self
                .published
                .write()
                .map_err(|e| EngineError::LockPoisoned(e.to_string()))?;
            *published = Arc::new(Published {
                patterns: pattern_set,
                insights,
                predictions,
                prediction_state,
                cycle_at: Some(now),
            });
        }
        patterns.complete_cycle(&analyzed, &updated);
        self.pipeline
            .events_since_cycle
            .fetch_sub(new_events, Ordering::AcqRel);
        self.pipeline
            .skipped_since_cycle
            .fetch_sub(skipped, Ordering::AcqRel);
        self.cycles_completed.fetch_add(1, Ordering::Relaxed);

        info!(
            patterns_updated = report.patterns_updated,
            patterns_pruned = report.patterns_pruned,
            insights = report.insights_generated,
            predictions = report.predictions_generated,
            events_skipped = report.events_skipped,
            duration_ms = report.duration_ms,
            "Cycle complete"
        );
        Ok(report)
    }

    /// Hand events and the snapshot to the store within the store timeout
    async fn persist(&self, store: &dyn EventStore, snapshot: &EngineSnapshot) -> Result<()> {
        let events = self.pipeline.take_unpersisted();
        let timeout = self.config.store_timeout();

        let outcome = tokio::time::timeout(timeout, async {
            store.append(&events).await?;
            store.save_snapshot(snapshot).await
        })
        .await;

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                self.pipeline.return_unpersisted(events);
                Err(EngineError::Store(e))
            }
            Err(_) => {
                self.pipeline.return_unpersisted(events);
                Err(EngineError::StoreTimeout(timeout))
            }
        }
    }

    // ========================================================================
    // STORE OPERATIONS
    // ========================================================================

    fn store(&self) -> Result<&Arc<dyn EventStore>> {
        self.store.as_ref().ok_or(EngineError::NoStore)
    }

    /// Replay stored events in `[start, end)` through the pipeline
    ///
    /// Events already folded are ignored. Returns how many were new.
    pub async fn hydrate_from_store(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<usize> {
        let store = self.store()?;
        let timeout = self.config.store_timeout();
        let events = tokio::time::timeout(timeout, store.query_range(start, end))
            .await
            .map_err(|_| EngineError::StoreTimeout(timeout))??;

        let total = events.len();
        let folded = self.pipeline.ingest(events, false);
        info!(total, folded, "Hydrated from store");
        Ok(folded)
    }

    /// Delete stored events and close buckets older than `cutoff`
    pub async fn retention_sweep(&self, cutoff: DateTime<Utc>) -> Result<RetentionReport> {
        let events_deleted = match &self.store {
            Some(store) => {
                let timeout = self.config.store_timeout();
                tokio::time::timeout(timeout, store.delete_before(cutoff))
                    .await
                    .map_err(|_| EngineError::StoreTimeout(timeout))??
            }
            None => 0,
        };
        let buckets_removed = self.pipeline.aggregator.sweep_before(cutoff);
        info!(events_deleted, buckets_removed, %cutoff, "Retention sweep complete");
        Ok(RetentionReport {
            events_deleted,
            buckets_removed,
        })
    }

    /// Load the last stored snapshot, if any, and restore it
    pub async fn restore_from_store(&self) -> Result<bool> {
        let store = self.store()?;
        let timeout = self.config.store_timeout();
        let snapshot = tokio::time::timeout(timeout, store.load_snapshot())
            .await
            .map_err(|_| EngineError::StoreTimeout(timeout))??;

        match snapshot {
            Some(snapshot) => {
                self.restore(snapshot)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // ========================================================================
    // SNAPSHOTS
    // ========================================================================

    /// Current buckets plus the published patterns, insights and predictions
    pub fn snapshot(&self) -> EngineSnapshot {
        let published = self.published();
        EngineSnapshot::new(
            published.cycle_at.unwrap_or_else(Utc::now),
            self.pipeline.aggregator.snapshot(),
            published.patterns.clone(),
            published.insights.clone(),
            published.predictions.clone(),
        )
        .with_prediction_state(published.prediction_state)
    }

    /// Replace all engine state with `snapshot`
    ///
    /// Events still buffered in the queue or waiting for the store hand-off
    /// belong to the state being replaced and are dropped. Producers should
    /// be quiet while restoring; an event folded concurrently may land in
    /// either state.
    pub fn restore(&self, snapshot: EngineSnapshot) -> Result<()> {
        if self.cycle_in_flight.load(Ordering::Acquire) {
            return Err(EngineError::AlreadyProcessing);
        }
        let EngineSnapshot {
            taken_at,
            buckets,
            patterns,
            insights,
            predictions,
            prediction_state,
            ..
        } = snapshot;

        let buffered = self.queue.discard()?;
        let unpersisted = self.pipeline.discard_unpersisted();
        if buffered > 0 || unpersisted > 0 {
            warn!(buffered, unpersisted, "Dropping pending events replaced by restore");
        }

        self.pipeline.aggregator.restore(buckets);
        self.pipeline.patterns.restore(patterns.clone());
        self.pipeline.events_since_cycle.store(0, Ordering::Release);
        self.pipeline.skipped_since_cycle.store(0, Ordering::Release);

        let mut published = self
            .published
            .write()
            .map_err(|e| EngineError::LockPoisoned(e.to_string()))?;
        *published = Arc::new(Published {
            patterns,
            insights,
            predictions,
            prediction_state,
            cycle_at: Some(taken_at),
        });
        info!(%taken_at, "Restored engine snapshot");
        Ok(())
    }

    // ========================================================================
    // EVALUATION
    // ========================================================================

    /// Score `predictions` against `actuals` on a blocking thread
    pub async fn evaluate_predictions(
        predictions: Vec<Prediction>,
        actuals: Vec<Event>,
    ) -> Result<AccuracyReport> {
        tokio::task::spawn_blocking(move || PredictionEngine::evaluate(&predictions, &actuals))
            .await
            .map_err(|e| EngineError::TaskFailed(e.to_string()))
    }
}

fn check(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(EngineError::Cancelled)
    } else {
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
