//! Event Queue
//!
//! Admission point of the pipeline. Critical events are dispatched on the
//! caller's thread before `submit` returns; everything else goes to the
//! [`BatchScheduler`] buffer.
//!
//! Backpressure: emission happens on the producer that fills the batch, under
//! the scheduler lock. Other producers block on that lock until the batch has
//! been folded, so the buffer never grows past `batch_size` and no event is
//! ever dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::scheduler::{BatchScheduler, BatchSink, Emission};
use crate::cancel::CancellationToken;
use crate::config::QueueConfig;
use crate::event::{Event, EventInput, ValidationError};

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Invalid event: {0}")]
    Validation(#[from] ValidationError),
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

// ============================================================================
// TYPES
// ============================================================================

/// What happened to a submitted event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubmitOutcome {
    /// Critical event, folded before returning
    Dispatched,
    /// Waiting in the batch buffer
    Buffered,
    /// Completed a batch of this many events, folded before returning
    BatchEmitted(usize),
}

/// Queue counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub submitted: u64,
    pub rejected: u64,
    pub dispatched_immediately: u64,
    pub batches_emitted: u64,
    pub events_batched: u64,
    pub pending: usize,
}

// ============================================================================
// EVENT QUEUE
// ============================================================================

/// Priority-aware admission queue
pub struct EventQueue {
    scheduler: Mutex<BatchScheduler>,
    sink: Arc<dyn BatchSink>,
    submitted: AtomicU64,
    rejected: AtomicU64,
    dispatched_immediately: AtomicU64,
}

impl EventQueue {
    pub fn new(config: &QueueConfig, sink: Arc<dyn BatchSink>) -> Self {
        Self {
            scheduler: Mutex::new(BatchScheduler::new(config, sink.clone())),
            sink,
            submitted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            dispatched_immediately: AtomicU64::new(0),
        }
    }

    /// Validate and admit a raw event
    pub fn submit(&self, input: EventInput) -> Result<SubmitOutcome, QueueError> {
        match input.validate() {
            Ok(event) => self.submit_event(event),
            Err(e) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                debug!(error = %e, "Rejected event at ingress");
                Err(QueueError::Validation(e))
            }
        }
    }

    /// Admit an already-validated event
    pub fn submit_event(&self, event: Event) -> Result<SubmitOutcome, QueueError> {
        self.submitted.fetch_add(1, Ordering::Relaxed);

        if event.priority().is_immediate() {
            debug!(event_id = event.id(), "Dispatching critical event immediately");
            self.dispatched_immediately.fetch_add(1, Ordering::Relaxed);
            self.sink.dispatch(vec![event]);
            return Ok(SubmitOutcome::Dispatched);
        }

        let emission = self.lock()?.push(event);
        Ok(match emission {
            Some(Emission { size, .. }) => SubmitOutcome::BatchEmitted(size),
            None => SubmitOutcome::Buffered,
        })
    }

    /// Release the buffer if the flush interval has elapsed
    pub fn poll(&self) -> Result<Option<Emission>, QueueError> {
        Ok(self.lock()?.poll())
    }

    /// Release the buffer now
    pub fn flush(&self) -> Result<Option<Emission>, QueueError> {
        Ok(self.lock()?.flush())
    }

    /// Drop buffered events without dispatching them
    pub fn discard(&self) -> Result<usize, QueueError> {
        Ok(self.lock()?.discard())
    }

    /// Events waiting in the buffer
    pub fn pending(&self) -> usize {
        self.lock().map(|s| s.pending()).unwrap_or(0)
    }

    pub fn stats(&self) -> QueueStats {
        let (batches_emitted, events_batched, pending) = self
            .lock()
            .map(|s| (s.batches_emitted(), s.events_emitted(), s.pending()))
            .unwrap_or_default();

        QueueStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            dispatched_immediately: self.dispatched_immediately.load(Ordering::Relaxed),
            batches_emitted,
            events_batched,
            pending,
        }
    }

    /// Spawn a task that releases partial batches on the flush interval
    ///
    /// The task polls at `tick` granularity and stops once `cancel` fires,
    /// flushing whatever is still buffered on the way out.
    pub fn spawn_interval_flush(
        self: &Arc<Self>,
        tick: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick);
            loop {
                ticker.tick().await;
                if cancel.is_cancelled() {
                    if let Err(e) = queue.flush() {
                        warn!("Final flush failed: {}", e);
                    }
                    break;
                }
                match queue.poll() {
                    Ok(Some(emission)) => {
                        debug!(size = emission.size, "Interval flush released batch");
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!("Interval flush failed: {}", e);
                        break;
                    }
                }
            }
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, BatchScheduler>, QueueError> {
        self.scheduler
            .lock()
            .map_err(|e| QueueError::LockPoisoned(e.to_string()))
    }
}

// ============================================================================
// TESTS
// ============================================================================
