//! Cache trigger service.
//!
//! Publishes mutation events and consumes them before returning, so a write
//! that reports success has already dropped every entry it made stale.

use std::sync::Arc;

use tracing::debug;

use super::consumer::CacheConsumer;
use super::events::{EventKind, EventQueue};
use super::store::QueryCache;

pub struct CacheTrigger {
    cache: Arc<QueryCache>,
    queue: Arc<EventQueue>,
    consumer: CacheConsumer,
}

impl CacheTrigger {
    pub fn new(cache: Arc<QueryCache>) -> Self {
        let queue = Arc::new(EventQueue::new());
        let consumer = CacheConsumer::new(cache.clone(), queue.clone());
        Self {
            cache,
            queue,
            consumer,
        }
    }

    pub fn trigger(&self, kind: EventKind) {
        if !self.cache.config().enabled {
            debug!(event_kind = ?kind, "Cache trigger skipped: cache disabled");
            return;
        }

        self.queue.publish(kind);
        self.consumer.consume();
    }

    pub fn record_created(&self, record_id: &str, slug: &str) {
        self.trigger(EventKind::RecordCreated {
            record_id: record_id.to_string(),
            slug: slug.to_string(),
        });
    }

    pub fn record_updated(&self, record_id: &str, slug: &str, aggregates_changed: bool) {
        self.trigger(EventKind::RecordUpdated {
            record_id: record_id.to_string(),
            slug: slug.to_string(),
            aggregates_changed,
        });
    }

    pub fn record_deleted(&self, record_id: &str) {
        self.trigger(EventKind::RecordDeleted {
            record_id: record_id.to_string(),
        });
    }

    pub fn publish_toggled(&self, record_id: &str, slug: &str) {
        self.trigger(EventKind::PublishToggled {
            record_id: record_id.to_string(),
            slug: slug.to_string(),
        });
    }

    pub fn comments_changed(&self, post_id: &str) {
        self.trigger(EventKind::CommentsChanged {
            post_id: post_id.to_string(),
        });
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::application::resolver::Resolved;
    use crate::cache::config::CacheConfig;
    use crate::cache::keys::QueryKey;
    use crate::cache::store::Cacheable;

    fn create_trigger(enabled: bool) -> CacheTrigger {
        CacheTrigger::new(Arc::new(QueryCache::new(CacheConfig {
            enabled,
            ..Default::default()
        })))
    }

    #[test]
    fn trigger_consumes_immediately() {
        let trigger = create_trigger(true);
        let key = QueryKey::approved_comments("9");
        let ticket = trigger.cache().begin_fetch();
        trigger.cache().set(
            key.clone(),
            Resolved::ok(Vec::<String>::new()).into_cached(),
            Duration::from_secs(60),
            Vec::new(),
            ticket,
        );

        trigger.comments_changed("9");

        assert!(trigger.queue().is_empty());
        assert!(!trigger.cache().contains(&key));
    }

    #[test]
    fn trigger_respects_disabled_config() {
        let trigger = create_trigger(false);
        trigger.record_deleted("1");
        assert!(trigger.queue().is_empty());
    }

    #[test]
    fn convenience_methods_leave_queue_empty() {
        let trigger = create_trigger(true);

        trigger.record_created("1", "a");
        trigger.record_updated("1", "b", true);
        trigger.publish_toggled("1", "b");
        trigger.record_deleted("1");
        trigger.comments_changed("1");

        assert!(trigger.queue().is_empty());
    }
}
