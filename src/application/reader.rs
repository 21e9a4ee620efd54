//! Read-through access to the query cache.
//!
//! Fresh entries are returned as is. Stale entries are returned immediately
//! while one background task per key refetches them. Misses are fetched
//! inline and stored, unless an invalidation overlapping the key landed
//! while the fetch was in flight.

use std::future::Future;
use std::sync::Arc;

use tracing::{Instrument, debug, debug_span};

use crate::cache::{Cacheable, FetchTicket, Lookup, QueryCache, QueryKey, TagGroup};

#[derive(Clone)]
pub struct CachedReader {
    cache: Arc<QueryCache>,
}

impl CachedReader {
    pub fn new(cache: Arc<QueryCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    /// `groups` are attached in addition to the value's own tag groups.
    pub async fn read<T, F, Fut>(&self, key: QueryKey, groups: Vec<TagGroup>, fetch: F) -> T
    where
        T: Cacheable,
        F: Fn() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        match self.cache.get(&key) {
            Lookup::Fresh(value) => {
                if let Some(hit) = T::from_cached(value) {
                    return hit;
                }
            }
            Lookup::Stale(value) => {
                if let Some(stale) = T::from_cached(value) {
                    self.revalidate(key, groups, fetch());
                    return stale;
                }
            }
            Lookup::Miss => {}
        }

        let ticket = self.cache.begin_fetch();
        let value = fetch().await;
        store(&self.cache, key, groups, value.clone(), ticket);
        value
    }

    fn revalidate<T, Fut>(&self, key: QueryKey, groups: Vec<TagGroup>, refetch: Fut)
    where
        T: Cacheable,
        Fut: Future<Output = T> + Send + 'static,
    {
        let Some(guard) = self.cache.try_begin_refresh(&key) else {
            debug!(key = %key, "Refresh already in flight");
            return;
        };

        let cache = self.cache.clone();
        let ticket = cache.begin_fetch();
        let span = debug_span!("cache_revalidate", key = %key);
        tokio::spawn(
            async move {
                let value = refetch.await;
                store(&cache, key, groups, value, ticket);
                drop(guard);
            }
            .instrument(span),
        );
    }
}

fn store<T: Cacheable>(
    cache: &QueryCache,
    key: QueryKey,
    mut groups: Vec<TagGroup>,
    value: T,
    ticket: FetchTicket,
) {
    if !value.is_cacheable() {
        return;
    }
    groups.extend(value.tag_groups());
    let ttl = cache.config().ttl_for(key.kind);
    cache.set(key, value.into_cached(), ttl, groups, ticket);
}
