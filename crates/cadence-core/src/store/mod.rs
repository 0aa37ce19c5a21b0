//! Event Store
//!
//! Persistence boundary of the engine. The store keeps raw events and the
//! snapshots produced at the end of each cycle; it never interprets them.
//! All calls are async so the engine can bound them with a timeout.

mod memory;

pub use memory::InMemoryEventStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::event::Event;
use crate::snapshot::EngineSnapshot;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// External persistence for events and engine snapshots
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Persist events, ignoring ids already stored
    async fn append(&self, events: &[Event]) -> Result<usize, StoreError>;

    /// Events with `start <= timestamp < end`, in timestamp order
    async fn query_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Event>, StoreError>;

    /// Delete events before `cutoff`; returns how many were removed
    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError>;

    async fn save_snapshot(&self, snapshot: &EngineSnapshot) -> Result<(), StoreError>;

    async fn load_snapshot(&self) -> Result<Option<EngineSnapshot>, StoreError>;
}
