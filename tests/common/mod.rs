#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use folio::application::repos::Repositories;
use folio::application::resolver::FallbackPolicy;
use folio::application::services::{ServiceSettings, Services};
use folio::cache::CacheConfig;
use folio::domain::entities::ContentRecord;
use folio::infra::backend::InMemoryBackend;
use folio::infra::snapshot::SnapshotStore;
use time::OffsetDateTime;
use time::macros::datetime;

pub struct Harness {
    pub backend: Arc<InMemoryBackend>,
    pub services: Services,
}

pub fn settings() -> ServiceSettings {
    ServiceSettings {
        probe_ttl: Duration::from_secs(30),
        backend_timeout: Duration::from_secs(1),
        fallback_policy: FallbackPolicy::EmptyFallsBackToStatic,
        cache: CacheConfig::default(),
    }
}

pub fn harness(records: Vec<ContentRecord>) -> Harness {
    harness_with(records, settings())
}

pub fn harness_with(records: Vec<ContentRecord>, settings: ServiceSettings) -> Harness {
    let backend = Arc::new(InMemoryBackend::with_records(records));
    let snapshot = Arc::new(SnapshotStore::bundled().expect("bundled snapshot parses"));
    let services = Services::build(
        Repositories::from_backend(backend.clone()),
        snapshot,
        &settings,
    );
    Harness { backend, services }
}

pub fn record(id: &str, slug: &str, tags: &[&str], published: bool) -> ContentRecord {
    record_at(id, slug, tags, published, datetime!(2025-01-01 00:00 UTC))
}

pub fn record_at(
    id: &str,
    slug: &str,
    tags: &[&str],
    published: bool,
    created_at: OffsetDateTime,
) -> ContentRecord {
    ContentRecord {
        id: id.to_string(),
        slug: slug.to_string(),
        title: format!("Live {slug}"),
        body: format!("Body of {slug}."),
        excerpt: None,
        tags: tags.iter().map(|tag| tag.to_string()).collect::<BTreeSet<_>>(),
        published,
        featured_image_url: None,
        created_at,
        updated_at: created_at,
        reading_time_minutes: 1,
    }
}

pub fn slugs(records: &[ContentRecord]) -> Vec<&str> {
    records.iter().map(|record| record.slug.as_str()).collect()
}
