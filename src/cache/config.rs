//! Query cache configuration.
//!
//! Controls capacity, per-kind TTLs and stale-while-revalidate via the
//! `[cache]` section of `folio.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

use super::keys::QueryKind;

const DEFAULT_CAPACITY: usize = 512;
const DEFAULT_LIST_TTL_SECONDS: u64 = 300;
const DEFAULT_DETAIL_TTL_SECONDS: u64 = 600;
const DEFAULT_TAGS_TTL_SECONDS: u64 = 1800;
const DEFAULT_COMMENTS_TTL_SECONDS: u64 = 120;
const DEFAULT_STALE_RETENTION_SECONDS: u64 = 300;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Disable to make every read a miss.
    pub enabled: bool,
    /// Maximum entries before LRU eviction.
    pub capacity: usize,
    /// Published-record listings.
    pub list_ttl_seconds: u64,
    /// Single records by slug.
    pub detail_ttl_seconds: u64,
    /// Tag listing.
    pub tags_ttl_seconds: u64,
    /// Approved comments of one post.
    pub comments_ttl_seconds: u64,
    /// How long an expired entry may still be served while it refreshes.
    pub stale_retention_seconds: u64,
    pub stale_while_revalidate: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: DEFAULT_CAPACITY,
            list_ttl_seconds: DEFAULT_LIST_TTL_SECONDS,
            detail_ttl_seconds: DEFAULT_DETAIL_TTL_SECONDS,
            tags_ttl_seconds: DEFAULT_TAGS_TTL_SECONDS,
            comments_ttl_seconds: DEFAULT_COMMENTS_TTL_SECONDS,
            stale_retention_seconds: DEFAULT_STALE_RETENTION_SECONDS,
            stale_while_revalidate: true,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            capacity: settings.capacity,
            list_ttl_seconds: settings.list_ttl_seconds,
            detail_ttl_seconds: settings.detail_ttl_seconds,
            tags_ttl_seconds: settings.tags_ttl_seconds,
            comments_ttl_seconds: settings.comments_ttl_seconds,
            stale_retention_seconds: settings.stale_retention_seconds,
            stale_while_revalidate: settings.stale_while_revalidate,
        }
    }
}

impl CacheConfig {
    /// Returns the capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn ttl_for(&self, kind: QueryKind) -> Duration {
        let seconds = match kind {
            QueryKind::List => self.list_ttl_seconds,
            QueryKind::Detail => self.detail_ttl_seconds,
            QueryKind::Tags => self.tags_ttl_seconds,
            QueryKind::Approved => self.comments_ttl_seconds,
        };
        Duration::from_secs(seconds)
    }

    pub fn stale_retention(&self) -> Duration {
        if self.stale_while_revalidate {
            Duration::from_secs(self.stale_retention_seconds)
        } else {
            Duration::ZERO
        }
    }
}
