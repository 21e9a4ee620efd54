//! Folio query cache
//!
//! Keyed, TTL-based cache of resolved reads with stale-while-revalidate and
//! event-driven invalidation:
//!
//! - reads check [`QueryCache`] and fall through to the source resolver on a
//!   miss (or revalidate in the background when stale);
//! - successful writes publish an [`EventKind`] through [`CacheTrigger`],
//!   which plans and applies the invalidation before the write returns.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! capacity = 512
//! list_ttl_seconds = 300
//! # ... see config.rs for all options
//! ```

mod config;
mod consumer;
mod events;
mod keys;
pub(crate) mod lock;
mod planner;
mod store;
mod trigger;

pub use config::CacheConfig;
pub use consumer::CacheConsumer;
pub use events::{CacheEvent, Epoch, EventKind, EventQueue};
pub use keys::{Family, KeyPrefix, QueryKey, QueryKind, TagGroup};
pub use planner::InvalidationPlan;
pub use store::{
    CachedValue, Cacheable, FetchTicket, Invalidation, Lookup, QueryCache, RefreshGuard,
};
pub use trigger::CacheTrigger;

pub(crate) use consumer::METRIC_CACHE_INVALIDATE_MS;
pub(crate) use store::{METRIC_CACHE_EVICT, METRIC_CACHE_HIT, METRIC_CACHE_MISS, METRIC_CACHE_STALE};
