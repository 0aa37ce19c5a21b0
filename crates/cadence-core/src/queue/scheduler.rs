//! Batch Scheduler
//!
//! Owns the ordered buffer of deferred events and decides *when* it is
//! released. A batch is emitted when either:
//!
//! 1. the buffer reaches `batch_size`, or
//! 2. `flush_interval` has elapsed since the last emission.
//!
//! The scheduler has no domain logic. Emission hands the whole batch, in
//! submission order, to a single [`BatchSink`].

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

use crate::config::QueueConfig;
use crate::event::Event;

/// Receiver of emitted batches
pub trait BatchSink: Send + Sync {
    /// Consume one batch. Per-event failures are handled inside the sink.
    fn dispatch(&self, batch: Vec<Event>);
}

/// Why a batch left the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FlushReason {
    /// Buffer reached `batch_size`
    Size,
    /// `flush_interval` elapsed
    Interval,
    /// Explicit flush (cycle start, shutdown)
    Forced,
}

/// Record of one emission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Emission {
    pub size: usize,
    pub reason: FlushReason,
}

/// Size/interval driven batch release
pub struct BatchScheduler {
    buffer: VecDeque<Event>,
    batch_size: usize,
    flush_interval: Duration,
    last_emission: Instant,
    batches_emitted: u64,
    events_emitted: u64,
    sink: Arc<dyn BatchSink>,
}

impl BatchScheduler {
    /// Create a scheduler emitting into `sink`
    pub fn new(config: &QueueConfig, sink: Arc<dyn BatchSink>) -> Self {
        Self {
            buffer: VecDeque::with_capacity(config.batch_size),
            batch_size: config.batch_size.max(1),
            flush_interval: config.flush_interval(),
            last_emission: Instant::now(),
            batches_emitted: 0,
            events_emitted: 0,
            sink,
        }
    }

    /// Append an event; emits immediately if the size threshold is reached
    pub fn push(&mut self, event: Event) -> Option<Emission> {
        self.buffer.push_back(event);
        if self.buffer.len() >= self.batch_size {
            self.emit(FlushReason::Size, Instant::now())
        } else {
            None
        }
    }

    /// Emit the buffer if the interval has elapsed at `now`
    pub fn poll_at(&mut self, now: Instant) -> Option<Emission> {
        if now.saturating_duration_since(self.last_emission) >= self.flush_interval {
            self.emit(FlushReason::Interval, now)
        } else {
            None
        }
    }

    /// Emit the buffer if the interval has elapsed
    pub fn poll(&mut self) -> Option<Emission> {
        self.poll_at(Instant::now())
    }

    /// Emit whatever is buffered, regardless of size or interval
    pub fn flush(&mut self) -> Option<Emission> {
        self.emit(FlushReason::Forced, Instant::now())
    }

    /// Drop the buffer without emitting it; returns how many were dropped
    pub fn discard(&mut self) -> usize {
        let dropped = self.buffer.len();
        self.buffer.clear();
        self.last_emission = Instant::now();
        dropped
    }

    /// Events waiting for the next emission
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn batches_emitted(&self) -> u64 {
        self.batches_emitted
    }

    pub fn events_emitted(&self) -> u64 {
        self.events_emitted
    }

    fn emit(&mut self, reason: FlushReason, now: Instant) -> Option<Emission> {
        if self.buffer.is_empty() {
            return None;
        }

        let batch: Vec<Event> = self.buffer.drain(..).collect();
        let size = batch.len();
        self.last_emission = now;
        self.batches_emitted += 1;
        self.events_emitted += size as u64;

        debug!(size, ?reason, "Emitting batch");
        self.sink.dispatch(batch);

        Some(Emission { size, reason })
    }
}

// ============================================================================
// TESTS
// ============================================================================
