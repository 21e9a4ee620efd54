//! Cache event system.
//!
//! Successful mutations publish events describing what changed; the consumer
//! turns queued events into an invalidation plan.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use super::lock::mutex_lock;

const SOURCE: &str = "cache::events";

/// Monotonic epoch for ordering events within this process.
pub type Epoch = u64;

#[derive(Debug, Clone)]
pub struct CacheEvent {
    /// Unique identifier for idempotency (UUIDv4).
    pub id: Uuid,
    pub epoch: Epoch,
    pub kind: EventKind,
    pub timestamp: OffsetDateTime,
}

impl CacheEvent {
    pub fn new(kind: EventKind, epoch: Epoch) -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch,
            kind,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

/// What a successful write changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// A record was created.
    RecordCreated { record_id: String, slug: String },
    /// A record was updated. `aggregates_changed` is set when tags or the
    /// publish flag were part of the patch.
    RecordUpdated {
        record_id: String,
        slug: String,
        aggregates_changed: bool,
    },
    /// A record was deleted.
    RecordDeleted { record_id: String },
    /// A record's publish flag was set.
    PublishToggled { record_id: String, slug: String },
    /// Comments of a post were created, moderated or deleted.
    CommentsChanged { post_id: String },
}

/// In-memory event queue for cache invalidation.
pub struct EventQueue {
    queue: Mutex<VecDeque<CacheEvent>>,
    epoch_counter: AtomicU64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            epoch_counter: AtomicU64::new(0),
        }
    }

    pub fn next_epoch(&self) -> Epoch {
        self.epoch_counter.fetch_add(1, Ordering::SeqCst)
    }

    pub fn publish(&self, kind: EventKind) {
        let epoch = self.next_epoch();
        let event = CacheEvent::new(kind.clone(), epoch);

        info!(
            event_id = %event.id,
            event_epoch = event.epoch,
            event_kind = ?kind,
            "Cache event enqueued"
        );

        mutex_lock(&self.queue, SOURCE, "publish").push_back(event);
    }

    /// Drain every queued event in FIFO order.
    pub fn drain(&self) -> Vec<CacheEvent> {
        mutex_lock(&self.queue, SOURCE, "drain").drain(..).collect()
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.queue, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
