//! Query cache storage.
//!
//! Entries are resolved read results keyed by [`QueryKey`], each with its own
//! TTL and tag groups. Expired entries are still served as stale for a
//! retention window so callers can revalidate in the background.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use lru::LruCache;
use metrics::counter;
use tokio::time::Instant;
use tracing::debug;

use crate::application::resolver::Resolved;
use crate::domain::entities::{Comment, ContentRecord};

use super::config::CacheConfig;
use super::keys::{KeyPrefix, QueryKey, TagGroup};
use super::lock::{mutex_lock, rw_read, rw_write};

const SOURCE: &str = "cache::store";
const INVALIDATION_LOG_LIMIT: usize = 256;

pub(crate) const METRIC_CACHE_HIT: &str = "folio_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "folio_cache_miss_total";
pub(crate) const METRIC_CACHE_STALE: &str = "folio_cache_stale_total";
pub(crate) const METRIC_CACHE_EVICT: &str = "folio_cache_evict_total";

/// Values the cache knows how to hold.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    Records(Resolved<Vec<ContentRecord>>),
    Record(Resolved<Option<ContentRecord>>),
    Tags(Resolved<Vec<String>>),
    Comments(Resolved<Vec<Comment>>),
}

/// Conversion between a typed read result and a [`CachedValue`].
pub trait Cacheable: Clone + Send + 'static {
    fn into_cached(self) -> CachedValue;

    fn from_cached(value: CachedValue) -> Option<Self>;

    /// Groups derived from the value itself.
    fn tag_groups(&self) -> Vec<TagGroup> {
        Vec::new()
    }

    /// Results carrying an error are returned but never stored.
    fn is_cacheable(&self) -> bool {
        true
    }
}

impl Cacheable for Resolved<Vec<ContentRecord>> {
    fn into_cached(self) -> CachedValue {
        CachedValue::Records(self)
    }

    fn from_cached(value: CachedValue) -> Option<Self> {
        match value {
            CachedValue::Records(inner) => Some(inner),
            _ => None,
        }
    }

    fn is_cacheable(&self) -> bool {
        self.error.is_none()
    }
}

impl Cacheable for Resolved<Option<ContentRecord>> {
    fn into_cached(self) -> CachedValue {
        CachedValue::Record(self)
    }

    fn from_cached(value: CachedValue) -> Option<Self> {
        match value {
            CachedValue::Record(inner) => Some(inner),
            _ => None,
        }
    }

    fn tag_groups(&self) -> Vec<TagGroup> {
        self.data
            .iter()
            .map(|record| TagGroup::Record(record.id.clone()))
            .collect()
    }

    fn is_cacheable(&self) -> bool {
        self.error.is_none()
    }
}

impl Cacheable for Resolved<Vec<String>> {
    fn into_cached(self) -> CachedValue {
        CachedValue::Tags(self)
    }

    fn from_cached(value: CachedValue) -> Option<Self> {
        match value {
            CachedValue::Tags(inner) => Some(inner),
            _ => None,
        }
    }

    fn is_cacheable(&self) -> bool {
        self.error.is_none()
    }
}

impl Cacheable for Resolved<Vec<Comment>> {
    fn into_cached(self) -> CachedValue {
        CachedValue::Comments(self)
    }

    fn from_cached(value: CachedValue) -> Option<Self> {
        match value {
            CachedValue::Comments(inner) => Some(inner),
            _ => None,
        }
    }

    fn is_cacheable(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of a cache read.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Fresh(CachedValue),
    /// Past its TTL but inside the retention window.
    Stale(CachedValue),
    Miss,
}

/// What an invalidation removes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidation {
    Key(QueryKey),
    Prefix(KeyPrefix),
    Group(TagGroup),
    All,
}

impl Invalidation {
    fn affects(&self, key: &QueryKey, groups: &[TagGroup]) -> bool {
        match self {
            Invalidation::Key(target) => target == key,
            Invalidation::Prefix(prefix) => key.starts_with(prefix),
            Invalidation::Group(group) => groups.contains(group),
            Invalidation::All => true,
        }
    }
}

/// Epoch observed when a fetch started.
///
/// A result is only stored if no invalidation affecting it happened after
/// the ticket was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    epoch: u64,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: CachedValue,
    fetched_at: Instant,
    ttl: Duration,
    groups: Vec<TagGroup>,
}

#[derive(Default)]
struct InvalidationLog {
    entries: VecDeque<(u64, Invalidation)>,
    /// Highest epoch no longer retained.
    truncated_through: u64,
}

impl InvalidationLog {
    fn record(&mut self, epoch: u64, invalidation: Invalidation) {
        self.entries.push_back((epoch, invalidation));
        while self.entries.len() > INVALIDATION_LOG_LIMIT {
            if let Some((dropped, _)) = self.entries.pop_front() {
                self.truncated_through = dropped;
            }
        }
    }

    fn invalidated_since(&self, ticket: FetchTicket, key: &QueryKey, groups: &[TagGroup]) -> bool {
        if self.truncated_through > ticket.epoch {
            return true;
        }
        self.entries
            .iter()
            .any(|(epoch, inv)| *epoch > ticket.epoch && inv.affects(key, groups))
    }
}

/// Keyed, TTL-based cache of resolved read results.
pub struct QueryCache {
    config: CacheConfig,
    entries: RwLock<LruCache<QueryKey, CacheEntry>>,
    invalidations: Mutex<InvalidationLog>,
    epoch: AtomicU64,
    refreshing: Arc<DashMap<QueryKey, ()>>,
}

impl QueryCache {
    pub fn new(config: CacheConfig) -> Self {
        let capacity = config.capacity_non_zero();
        Self {
            config,
            entries: RwLock::new(LruCache::new(capacity)),
            invalidations: Mutex::new(InvalidationLog::default()),
            epoch: AtomicU64::new(0),
            refreshing: Arc::new(DashMap::new()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn get(&self, key: &QueryKey) -> Lookup {
        if !self.config.enabled {
            return Lookup::Miss;
        }

        let kind = key.kind.as_str();
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        let Some(entry) = entries.get(key) else {
            counter!(METRIC_CACHE_MISS, "kind" => kind).increment(1);
            return Lookup::Miss;
        };

        let age = entry.fetched_at.elapsed();
        if age < entry.ttl {
            counter!(METRIC_CACHE_HIT, "kind" => kind).increment(1);
            return Lookup::Fresh(entry.value.clone());
        }
        if age < entry.ttl + self.config.stale_retention() {
            counter!(METRIC_CACHE_STALE, "kind" => kind).increment(1);
            return Lookup::Stale(entry.value.clone());
        }

        entries.pop(key);
        counter!(METRIC_CACHE_MISS, "kind" => kind).increment(1);
        Lookup::Miss
    }

    /// Take a ticket before starting the fetch whose result will be stored.
    pub fn begin_fetch(&self) -> FetchTicket {
        FetchTicket {
            epoch: self.epoch.load(Ordering::SeqCst),
        }
    }

    /// Store a fetched value. Returns `false` when the cache is disabled or
    /// an overlapping invalidation happened after `ticket` was taken.
    pub fn set(
        &self,
        key: QueryKey,
        value: CachedValue,
        ttl: Duration,
        groups: Vec<TagGroup>,
        ticket: FetchTicket,
    ) -> bool {
        if !self.config.enabled {
            return false;
        }

        let mut entries = rw_write(&self.entries, SOURCE, "set");
        if mutex_lock(&self.invalidations, SOURCE, "set.check").invalidated_since(
            ticket,
            &key,
            &groups,
        ) {
            debug!(key = %key, "Discarding result fetched before an invalidation");
            return false;
        }

        let kind = key.kind.as_str();
        let entry = CacheEntry {
            value,
            fetched_at: Instant::now(),
            ttl,
            groups,
        };
        if let Some((evicted, _)) = entries.push(key.clone(), entry)
            && evicted != key
        {
            counter!(METRIC_CACHE_EVICT, "kind" => kind).increment(1);
            debug!(key = %evicted, "Evicted least recently used cache entry");
        }
        true
    }

    pub fn invalidate_key(&self, key: &QueryKey) -> usize {
        self.invalidate(Invalidation::Key(key.clone()))
    }

    pub fn invalidate_prefix(&self, prefix: &KeyPrefix) -> usize {
        self.invalidate(Invalidation::Prefix(prefix.clone()))
    }

    pub fn invalidate_group(&self, group: &TagGroup) -> usize {
        self.invalidate(Invalidation::Group(group.clone()))
    }

    pub fn clear(&self) -> usize {
        self.invalidate(Invalidation::All)
    }

    /// Remove every entry matched by `invalidation`; returns how many were
    /// removed. In-flight fetches that overlap it will not be stored.
    pub fn invalidate(&self, invalidation: Invalidation) -> usize {
        let mut entries = rw_write(&self.entries, SOURCE, "invalidate");
        let doomed: Vec<QueryKey> = entries
            .iter()
            .filter(|(key, entry)| invalidation.affects(key, &entry.groups))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            entries.pop(key);
        }

        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        mutex_lock(&self.invalidations, SOURCE, "invalidate.record").record(epoch, invalidation);

        doomed.len()
    }

    /// Claim the background refresh slot for `key`. `None` while another
    /// refresh of the same key is in flight.
    pub fn try_begin_refresh(&self, key: &QueryKey) -> Option<RefreshGuard> {
        match self.refreshing.entry(key.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(());
                Some(RefreshGuard {
                    refreshing: self.refreshing.clone(),
                    key: key.clone(),
                })
            }
        }
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        rw_read(&self.entries, SOURCE, "contains").contains(key)
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Releases the refresh slot when dropped.
#[derive(Debug)]
pub struct RefreshGuard {
    refreshing: Arc<DashMap<QueryKey, ()>>,
    key: QueryKey,
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.refreshing.remove(&self.key);
    }
}
