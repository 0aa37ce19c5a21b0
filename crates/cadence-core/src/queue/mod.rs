//! Event admission
//!
//! - [`EventQueue`]: validates events and splits them between immediate and
//!   batched dispatch by priority
//! - [`BatchScheduler`]: releases batches on size or interval

mod event_queue;
mod scheduler;

pub use event_queue::{EventQueue, QueueError, QueueStats, SubmitOutcome};
pub use scheduler::{BatchScheduler, BatchSink, Emission, FlushReason};
