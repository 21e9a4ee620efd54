//! Content service: the read and write surface the site and admin UI use.

use std::sync::Arc;

use tracing::instrument;

use crate::application::commands::{CreateRecordCommand, UpdateRecordCommand};
use crate::application::mutations::{MutationCoordinator, MutationError};
use crate::application::reader::CachedReader;
use crate::application::repos::{ContentQuery, ReadScope};
use crate::application::resolver::{DataSourceInfo, ResolveError, Resolved, SourceResolver};
use crate::cache::{QueryKey, TagGroup};
use crate::domain::entities::ContentRecord;

#[derive(Clone)]
pub struct ContentService {
    resolver: Arc<SourceResolver>,
    mutations: Arc<MutationCoordinator>,
    reader: CachedReader,
}

impl ContentService {
    pub fn new(
        resolver: Arc<SourceResolver>,
        mutations: Arc<MutationCoordinator>,
        reader: CachedReader,
    ) -> Self {
        Self {
            resolver,
            mutations,
            reader,
        }
    }

    #[instrument(skip(self))]
    pub async fn get_published_records(
        &self,
        query: ContentQuery,
    ) -> Resolved<Vec<ContentRecord>> {
        let query = query.normalized();
        let key = QueryKey::content_list(&query);
        let resolver = self.resolver.clone();
        self.reader
            .read(key, Vec::new(), move || {
                let resolver = resolver.clone();
                let query = query.clone();
                async move { resolver.published_records(&query).await }
            })
            .await
    }

    /// Public lookups are cached and never fail. With `include_unpublished`
    /// the live backend is asked directly and unavailability is an error.
    #[instrument(skip(self))]
    pub async fn get_record_by_slug(
        &self,
        slug: &str,
        include_unpublished: bool,
    ) -> Result<Resolved<Option<ContentRecord>>, ResolveError> {
        let slug = slug.trim();
        match ReadScope::from_include_unpublished(include_unpublished) {
            ReadScope::Admin => self
                .resolver
                .admin_record_by_slug(slug)
                .await
                .map(Resolved::ok),
            ReadScope::Public => {
                let key = QueryKey::content_detail(slug, ReadScope::Public);
                let groups = vec![TagGroup::Slug(slug.to_string())];
                let resolver = self.resolver.clone();
                let owned = slug.to_string();
                Ok(self
                    .reader
                    .read(key, groups, move || {
                        let resolver = resolver.clone();
                        let slug = owned.clone();
                        async move { resolver.record_by_slug(&slug).await }
                    })
                    .await)
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn list_tags(&self) -> Resolved<Vec<String>> {
        let resolver = self.resolver.clone();
        self.reader
            .read(QueryKey::tags(), Vec::new(), move || {
                let resolver = resolver.clone();
                async move { resolver.tags().await }
            })
            .await
    }

    pub async fn create_record(
        &self,
        command: CreateRecordCommand,
    ) -> Result<ContentRecord, MutationError> {
        self.mutations.create_record(command).await
    }

    pub async fn update_record(
        &self,
        id: &str,
        command: UpdateRecordCommand,
    ) -> Result<ContentRecord, MutationError> {
        self.mutations.update_record(id, command).await
    }

    pub async fn delete_record(&self, id: &str) -> Result<(), MutationError> {
        self.mutations.delete_record(id).await
    }

    pub async fn toggle_published(
        &self,
        id: &str,
        published: bool,
    ) -> Result<ContentRecord, MutationError> {
        self.mutations.toggle_published(id, published).await
    }

    /// Which source is answering; informational only.
    pub async fn get_data_source_info(&self) -> DataSourceInfo {
        self.resolver.data_source_info().await
    }

    /// Forget the memoized availability verdict.
    pub async fn reset_probe(&self) {
        self.resolver.probe().invalidate().await;
    }
}
