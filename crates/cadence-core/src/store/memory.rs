//! In-memory event store
//!
//! Keeps events ordered by timestamp and the latest snapshot as JSON, so a
//! snapshot goes through the same serialization a durable store would use.
//! Latency and availability can be adjusted to exercise timeouts and
//! failure handling.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use super::{EventStore, StoreError};
use crate::event::Event;
use crate::snapshot::EngineSnapshot;

#[derive(Debug, Default)]
struct Inner {
    /// (timestamp, id) -> event
    events: BTreeMap<(DateTime<Utc>, String), Event>,
    ids: HashSet<String>,
    snapshot: Option<String>,
}

/// Event store backed by process memory
#[derive(Debug)]
pub struct InMemoryEventStore {
    inner: RwLock<Inner>,
    latency_ms: AtomicU64,
    available: AtomicBool,
    snapshots_saved: AtomicU64,
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            latency_ms: AtomicU64::new(0),
            available: AtomicBool::new(true),
            snapshots_saved: AtomicU64::new(0),
        }
    }

    /// Delay applied to every call
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// When unavailable, every call fails with `StoreError::Unavailable`
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Relaxed);
    }

    pub fn snapshots_saved(&self) -> u64 {
        self.snapshots_saved.load(Ordering::Relaxed)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.events.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn gate(&self) -> Result<(), StoreError> {
        let latency = self.latency_ms.load(Ordering::Relaxed);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.available.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("in-memory store disabled".to_string()))
        }
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, events: &[Event]) -> Result<usize, StoreError> {
        self.gate().await?;
        let mut inner = self.inner.write().await;
        let mut added = 0;
        for event in events {
            if inner.ids.insert(event.id().to_string()) {
                inner
                    .events
                    .insert((event.timestamp(), event.id().to_string()), event.clone());
                added += 1;
            }
        }
        debug!(added, total = inner.events.len(), "Appended events");
        Ok(added)
    }

    async fn query_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Event>, StoreError> {
        self.gate().await?;
        if start >= end {
            return Ok(Vec::new());
        }
        let inner = self.inner.read().await;
        Ok(inner
            .events
            .range((start, String::new())..(end, String::new()))
            .map(|(_, e)| e.clone())
            .collect())
    }

    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        self.gate().await?;
        let mut inner = self.inner.write().await;
        let kept = inner.events.split_off(&(cutoff, String::new()));
        let removed = std::mem::replace(&mut inner.events, kept);
        for (_, id) in removed.keys() {
            inner.ids.remove(id);
        }
        Ok(removed.len())
    }

    async fn save_snapshot(&self, snapshot: &EngineSnapshot) -> Result<(), StoreError> {
        self.gate().await?;
        let json = serde_json::to_string(snapshot)?;
        self.inner.write().await.snapshot = Some(json);
        self.snapshots_saved.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn load_snapshot(&self) -> Result<Option<EngineSnapshot>, StoreError> {
        self.gate().await?;
        let inner = self.inner.read().await;
        match &inner.snapshot {
            Some(json) => Ok(Some(serde_json::from_str(json)?)),
            None => Ok(None),
        }
    }
}
