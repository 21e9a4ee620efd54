//! Cache consumer for executing invalidation plans.

use std::sync::Arc;
use std::time::Instant;

use metrics::histogram;
use tracing::{info, instrument};
use uuid::Uuid;

use super::events::EventQueue;
use super::planner::InvalidationPlan;
use super::store::QueryCache;

pub(crate) const METRIC_CACHE_INVALIDATE_MS: &str = "folio_cache_invalidate_ms";

/// Drains the event queue and applies the resulting plan to the cache.
pub struct CacheConsumer {
    cache: Arc<QueryCache>,
    queue: Arc<EventQueue>,
}

impl CacheConsumer {
    pub fn new(cache: Arc<QueryCache>, queue: Arc<EventQueue>) -> Self {
        Self { cache, queue }
    }

    /// Consume pending events. Returns true if any events were processed.
    #[instrument(skip(self))]
    pub fn consume(&self) -> bool {
        let started_at = Instant::now();
        let events = self.queue.drain();
        if events.is_empty() {
            return false;
        }

        let event_count = events.len();
        let event_ids: Vec<Uuid> = events.iter().map(|e| e.id).collect();
        let plan = InvalidationPlan::from_events(events);

        info!(
            event_count,
            event_ids = ?event_ids,
            plan = %plan,
            "Cache invalidation starting"
        );

        let mut removed = 0usize;
        for prefix in &plan.prefixes {
            removed += self.cache.invalidate_prefix(prefix);
        }
        for group in &plan.groups {
            removed += self.cache.invalidate_group(group);
        }

        info!(event_count, removed, "Cache invalidation complete");

        histogram!(METRIC_CACHE_INVALIDATE_MS)
            .record(started_at.elapsed().as_secs_f64() * 1000.0);

        true
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::application::repos::ReadScope;
    use crate::application::resolver::Resolved;
    use crate::cache::config::CacheConfig;
    use crate::cache::events::EventKind;
    use crate::cache::keys::{QueryKey, TagGroup};
    use crate::cache::store::Cacheable;

    fn seed(cache: &QueryCache, key: QueryKey, groups: Vec<TagGroup>) {
        let ticket = cache.begin_fetch();
        let value = Resolved::ok(Vec::<String>::new()).into_cached();
        cache.set(key, value, Duration::from_secs(60), groups, ticket);
    }

    #[test]
    fn consume_applies_plan() {
        let cache = Arc::new(QueryCache::new(CacheConfig::default()));
        let queue = Arc::new(EventQueue::new());
        let consumer = CacheConsumer::new(cache.clone(), queue.clone());

        let list = QueryKey::content_list(&Default::default());
        let detail = QueryKey::content_detail("hello", ReadScope::Public);
        let other = QueryKey::content_detail("other", ReadScope::Public);
        let tags = QueryKey::tags();
        seed(&cache, list.clone(), Vec::new());
        seed(
            &cache,
            detail.clone(),
            vec![TagGroup::Record("1".into()), TagGroup::Slug("hello".into())],
        );
        seed(
            &cache,
            other.clone(),
            vec![TagGroup::Record("2".into()), TagGroup::Slug("other".into())],
        );
        seed(&cache, tags.clone(), Vec::new());

        queue.publish(EventKind::RecordUpdated {
            record_id: "1".into(),
            slug: "hello".into(),
            aggregates_changed: false,
        });

        assert!(consumer.consume());
        assert!(!cache.contains(&list));
        assert!(!cache.contains(&detail));
        assert!(cache.contains(&other));
        assert!(cache.contains(&tags));
    }

    #[test]
    fn consume_on_empty_queue_is_noop() {
        let cache = Arc::new(QueryCache::new(CacheConfig::default()));
        let consumer = CacheConsumer::new(cache, Arc::new(EventQueue::new()));
        assert!(!consumer.consume());
    }
}
