//! Per-read choice between the live backend and the static snapshot.
//!
//! Public reads never fail: when the backend is unavailable, errors, or
//! (depending on [`FallbackPolicy`]) answers with nothing, the snapshot
//! answers instead with identical filter semantics. Admin reads never fall
//! back and fail with [`ResolveError`] instead.

use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use metrics::counter;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::application::availability::AvailabilityProbe;
use crate::application::repos::{
    CommentsRepo, ContentQuery, ContentReadRepo, ReadScope, RepoError,
};
use crate::cache::lock::{rw_read, rw_write};
use crate::domain::entities::{Comment, ContentRecord};
use crate::domain::types::DataSource;
use crate::infra::snapshot::SnapshotStore;

const SOURCE: &str = "application::resolver";
pub(crate) const METRIC_RESOLVE_FALLBACK: &str = "folio_resolve_fallback_total";

const COMMENTS_OFFLINE: &str = "comments are unavailable while the live backend is unreachable";

/// Normalized read result. Callers cannot tell which source produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolved<T> {
    pub data: T,
    /// Total matches before pagination, for listings.
    pub count: Option<u64>,
    /// Informational; set only when no source could answer.
    pub error: Option<String>,
}

impl<T> Resolved<T> {
    pub fn ok(data: T) -> Self {
        Self {
            data,
            count: None,
            error: None,
        }
    }

    pub fn counted(data: T, count: u64) -> Self {
        Self {
            data,
            count: Some(count),
            error: None,
        }
    }

    pub fn failed(data: T, error: impl Into<String>) -> Self {
        Self {
            data,
            count: Some(0),
            error: Some(error.into()),
        }
    }
}

/// What to do when the live backend answers successfully with nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Serve the snapshot when it has something to show.
    #[default]
    EmptyFallsBackToStatic,
    /// An empty live answer is the answer.
    DynamicIsAuthoritative,
}

impl FallbackPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            FallbackPolicy::EmptyFallsBackToStatic => "empty_falls_back_to_static",
            FallbackPolicy::DynamicIsAuthoritative => "dynamic_is_authoritative",
        }
    }

    fn falls_back_on_empty(self) -> bool {
        matches!(self, FallbackPolicy::EmptyFallsBackToStatic)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("the live backend is unavailable; unpublished content cannot be read")]
    BackendUnavailable,
    #[error("{message}")]
    Backend {
        message: String,
        code: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DataSourceInfo {
    pub is_dynamic_available: bool,
    pub data_source: DataSource,
}

pub struct SourceResolver {
    probe: Arc<AvailabilityProbe>,
    content: Arc<dyn ContentReadRepo>,
    comments: Arc<dyn CommentsRepo>,
    snapshot: Arc<SnapshotStore>,
    policy: FallbackPolicy,
    timeout: Duration,
    last_source: RwLock<Option<DataSource>>,
}

impl SourceResolver {
    pub fn new(
        probe: Arc<AvailabilityProbe>,
        content: Arc<dyn ContentReadRepo>,
        comments: Arc<dyn CommentsRepo>,
        snapshot: Arc<SnapshotStore>,
        policy: FallbackPolicy,
    ) -> Self {
        let timeout = probe.timeout();
        Self {
            probe,
            content,
            comments,
            snapshot,
            policy,
            timeout,
            last_source: RwLock::new(None),
        }
    }

    pub fn policy(&self) -> FallbackPolicy {
        self.policy
    }

    pub fn probe(&self) -> &Arc<AvailabilityProbe> {
        &self.probe
    }

    pub fn snapshot(&self) -> &Arc<SnapshotStore> {
        &self.snapshot
    }

    /// Source that answered the most recent content read, if any. Comment
    /// reads do not count.
    pub fn last_source(&self) -> Option<DataSource> {
        *rw_read(&self.last_source, SOURCE, "last_source")
    }

    #[instrument(skip(self), fields(policy = self.policy.as_str()))]
    pub async fn published_records(&self, query: &ContentQuery) -> Resolved<Vec<ContentRecord>> {
        if self.probe.check_availability().await {
            match self.guarded(self.content.list_published(query)).await {
                Ok(page) => {
                    // A page past the end of a non-empty listing is a valid answer.
                    let empty = page.total == 0;
                    if !(empty && self.policy.falls_back_on_empty()) {
                        return self.dynamic(Resolved::counted(
                            derive_all(page.items),
                            page.total,
                        ));
                    }
                    let fallback = self.snapshot.list_snapshot_records(query);
                    if fallback.items.is_empty() {
                        return self.dynamic(Resolved::counted(Vec::new(), page.total));
                    }
                    self.fell_back("published_records", "empty");
                    return self.fixed(Resolved::counted(fallback.items, fallback.total));
                }
                Err(err) => {
                    warn!(error = %err, "Listing failed on the live backend");
                    self.fell_back("published_records", "error");
                }
            }
        } else {
            self.fell_back("published_records", "unavailable");
        }

        let page = self.snapshot.list_snapshot_records(query);
        self.fixed(Resolved::counted(page.items, page.total))
    }

    /// Published record by slug. A draft on the live backend is not found,
    /// and is never replaced by a snapshot copy.
    #[instrument(skip(self), fields(policy = self.policy.as_str()))]
    pub async fn record_by_slug(&self, slug: &str) -> Resolved<Option<ContentRecord>> {
        if self.probe.check_availability().await {
            match self
                .guarded(self.content.find_by_slug(slug, ReadScope::Public))
                .await
            {
                Ok(Some(record)) if record.published => {
                    return self.dynamic(Resolved::ok(Some(record.with_derived_fields())));
                }
                Ok(Some(_)) => {
                    debug!(slug, "Live record is unpublished");
                    return self.dynamic(Resolved::ok(None));
                }
                Ok(None) if !self.policy.falls_back_on_empty() => {
                    return self.dynamic(Resolved::ok(None));
                }
                Ok(None) => match self.snapshot.find_by_slug(slug) {
                    Some(record) => {
                        self.fell_back("record_by_slug", "empty");
                        return self.fixed(Resolved::ok(Some(record)));
                    }
                    None => return self.dynamic(Resolved::ok(None)),
                },
                Err(err) => {
                    warn!(error = %err, slug, "Slug lookup failed on the live backend");
                    self.fell_back("record_by_slug", "error");
                }
            }
        } else {
            self.fell_back("record_by_slug", "unavailable");
        }

        self.fixed(Resolved::ok(self.snapshot.find_by_slug(slug)))
    }

    /// Record by slug including drafts. Live backend only.
    #[instrument(skip(self))]
    pub async fn admin_record_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<ContentRecord>, ResolveError> {
        if !self.probe.check_availability().await {
            return Err(ResolveError::BackendUnavailable);
        }

        match self
            .guarded(self.content.find_by_slug(slug, ReadScope::Admin))
            .await
        {
            Ok(record) => {
                self.record_source(DataSource::Dynamic);
                Ok(record.map(ContentRecord::with_derived_fields))
            }
            Err(err) if err.is_transient() => Err(ResolveError::BackendUnavailable),
            Err(err) => Err(ResolveError::Backend {
                code: err.code().map(str::to_string),
                message: err.to_string(),
            }),
        }
    }

    #[instrument(skip(self), fields(policy = self.policy.as_str()))]
    pub async fn tags(&self) -> Resolved<Vec<String>> {
        if self.probe.check_availability().await {
            match self.guarded(self.content.list_tags()).await {
                Ok(tags) if tags.is_empty() && self.policy.falls_back_on_empty() => {
                    let fallback = self.snapshot.tags();
                    if fallback.is_empty() {
                        return self.dynamic(Resolved::counted(tags, 0));
                    }
                    self.fell_back("tags", "empty");
                    let count = fallback.len() as u64;
                    return self.fixed(Resolved::counted(fallback, count));
                }
                Ok(tags) => {
                    let count = tags.len() as u64;
                    return self.dynamic(Resolved::counted(tags, count));
                }
                Err(err) => {
                    warn!(error = %err, "Tag listing failed on the live backend");
                    self.fell_back("tags", "error");
                }
            }
        } else {
            self.fell_back("tags", "unavailable");
        }

        let tags = self.snapshot.tags();
        let count = tags.len() as u64;
        self.fixed(Resolved::counted(tags, count))
    }

    /// Approved comments of a post. The snapshot carries no comments, so a
    /// fallback yields an empty list with an informational error.
    #[instrument(skip(self))]
    pub async fn approved_comments(&self, post_id: &str) -> Resolved<Vec<Comment>> {
        if self.probe.check_availability().await {
            match self.guarded(self.comments.list_approved(post_id)).await {
                Ok(comments) => {
                    let visible: Vec<Comment> = comments
                        .into_iter()
                        .filter(|comment| comment.status.is_public())
                        .collect();
                    let count = visible.len() as u64;
                    return Resolved::counted(visible, count);
                }
                Err(err) => {
                    warn!(error = %err, post_id, "Comment listing failed on the live backend");
                    self.fell_back("approved_comments", "error");
                }
            }
        } else {
            self.fell_back("approved_comments", "unavailable");
        }

        Resolved::failed(Vec::new(), COMMENTS_OFFLINE)
    }

    /// Cached answers do not pass through the resolver, so the current
    /// verdict wins over `last_source` once the backend is gone.
    pub async fn data_source_info(&self) -> DataSourceInfo {
        let is_dynamic_available = self.probe.check_availability().await;
        let data_source = if is_dynamic_available {
            self.last_source().unwrap_or(DataSource::Dynamic)
        } else {
            DataSource::Static
        };
        DataSourceInfo {
            is_dynamic_available,
            data_source,
        }
    }

    async fn guarded<T, F>(&self, call: F) -> Result<T, RepoError>
    where
        F: Future<Output = Result<T, RepoError>>,
    {
        tokio::time::timeout(self.timeout, call)
            .await
            .unwrap_or(Err(RepoError::Timeout))
    }

    fn dynamic<T>(&self, resolved: Resolved<T>) -> Resolved<T> {
        self.record_source(DataSource::Dynamic);
        resolved
    }

    fn fixed<T>(&self, resolved: Resolved<T>) -> Resolved<T> {
        self.record_source(DataSource::Static);
        resolved
    }

    fn record_source(&self, source: DataSource) {
        *rw_write(&self.last_source, SOURCE, "record_source") = Some(source);
    }

    fn fell_back(&self, operation: &'static str, reason: &'static str) {
        debug!(operation, reason, "Serving from static snapshot");
        counter!(METRIC_RESOLVE_FALLBACK, "operation" => operation, "reason" => reason)
            .increment(1);
    }
}

fn derive_all(records: Vec<ContentRecord>) -> Vec<ContentRecord> {
    records
        .into_iter()
        .map(ContentRecord::with_derived_fields)
        .collect()
}
