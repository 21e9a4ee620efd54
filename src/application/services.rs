//! Wiring of probe, resolver, cache and coordinator into the services.

use std::sync::Arc;
use std::time::Duration;

use crate::application::availability::{
    AvailabilityProbe, DEFAULT_PROBE_TIMEOUT, DEFAULT_PROBE_TTL,
};
use crate::application::comments::{CommentService, ContactService};
use crate::application::content::ContentService;
use crate::application::mutations::MutationCoordinator;
use crate::application::reader::CachedReader;
use crate::application::repos::Repositories;
use crate::application::resolver::{FallbackPolicy, SourceResolver};
use crate::cache::{CacheConfig, CacheTrigger, QueryCache};
use crate::infra::snapshot::SnapshotStore;

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub probe_ttl: Duration,
    /// Bound on every backend call made by the probe, resolver and coordinator.
    pub backend_timeout: Duration,
    pub fallback_policy: FallbackPolicy,
    pub cache: CacheConfig,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            probe_ttl: DEFAULT_PROBE_TTL,
            backend_timeout: DEFAULT_PROBE_TIMEOUT,
            fallback_policy: FallbackPolicy::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl From<&crate::config::Settings> for ServiceSettings {
    fn from(settings: &crate::config::Settings) -> Self {
        Self {
            probe_ttl: settings.probe.ttl(),
            backend_timeout: settings.backend.timeout(),
            fallback_policy: settings.resolver.fallback_policy,
            cache: CacheConfig::from(&settings.cache),
        }
    }
}

/// Everything the HTTP layer and the CLI need, sharing one probe and one
/// query cache.
#[derive(Clone)]
pub struct Services {
    pub content: ContentService,
    pub comments: CommentService,
    pub contact: ContactService,
    pub probe: Arc<AvailabilityProbe>,
    pub cache: Arc<QueryCache>,
    pub resolver: Arc<SourceResolver>,
}

impl Services {
    pub fn build(
        repos: Repositories,
        snapshot: Arc<SnapshotStore>,
        settings: &ServiceSettings,
    ) -> Self {
        let probe = Arc::new(AvailabilityProbe::new(
            repos.content.clone(),
            settings.probe_ttl,
            settings.backend_timeout,
        ));
        let resolver = Arc::new(SourceResolver::new(
            probe.clone(),
            repos.content.clone(),
            repos.comments.clone(),
            snapshot,
            settings.fallback_policy,
        ));
        let cache = Arc::new(QueryCache::new(settings.cache.clone()));
        let trigger = Arc::new(CacheTrigger::new(cache.clone()));
        let mutations = Arc::new(MutationCoordinator::new(
            probe.clone(),
            repos.content_writer,
            repos.comments,
            repos.contact,
            trigger,
        ));
        let reader = CachedReader::new(cache.clone());

        Self {
            content: ContentService::new(resolver.clone(), mutations.clone(), reader.clone()),
            comments: CommentService::new(resolver.clone(), mutations.clone(), reader),
            contact: ContactService::new(mutations),
            probe,
            cache,
            resolver,
        }
    }
}
