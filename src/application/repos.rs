//! Repository traits describing the dynamic content backend.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::{Comment, ContactMessage, ContentRecord};
use crate::domain::types::{CommentStatus, ContactStatus};

pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepoError {
    #[error("backend unreachable: {0}")]
    Unavailable(String),
    #[error("backend request timed out")]
    Timeout,
    #[error("resource not found")]
    NotFound,
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("backend error: {message}")]
    Backend {
        message: String,
        code: Option<String>,
    },
    #[error("malformed backend response: {0}")]
    Decode(String),
}

impl RepoError {
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::Unavailable(err.to_string())
    }

    pub fn backend(message: impl Into<String>, code: Option<String>) -> Self {
        Self::Backend {
            message: message.into(),
            code,
        }
    }

    /// Connection failures and timeouts; everything else is a definite answer
    /// from the backend.
    pub fn is_transient(&self) -> bool {
        matches!(self, RepoError::Unavailable(_) | RepoError::Timeout)
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            RepoError::Backend { code, .. } => code.as_deref(),
            RepoError::Duplicate { .. } => Some("duplicate"),
            RepoError::NotFound => Some("not_found"),
            RepoError::InvalidInput { .. } => Some("invalid_input"),
            RepoError::Unavailable(_) | RepoError::Timeout | RepoError::Decode(_) => None,
        }
    }
}

/// Visibility of a slug lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadScope {
    /// Published records only.
    Public,
    /// Drafts included; never answered from the static snapshot.
    Admin,
}

impl ReadScope {
    pub fn from_include_unpublished(include_unpublished: bool) -> Self {
        if include_unpublished {
            ReadScope::Admin
        } else {
            ReadScope::Public
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReadScope::Public => "public",
            ReadScope::Admin => "admin",
        }
    }
}

/// Filters accepted by published-record listings.
///
/// Identical semantics apply to the live backend and the static snapshot:
/// tag overlap, case-insensitive substring search over title, excerpt and
/// body, newest first, then offset and limit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentQuery {
    pub tags: Vec<String>,
    pub search: Option<String>,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl ContentQuery {
    /// Canonical form: lowercase, sorted, deduplicated tags; trimmed search;
    /// limit clamped to [`MAX_PAGE_SIZE`].
    pub fn normalized(self) -> Self {
        let tags = self
            .tags
            .iter()
            .map(|tag| tag.trim().to_lowercase())
            .filter(|tag| !tag.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let search = self.search.and_then(|value| {
            let trimmed = value.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        });
        let limit = self.limit.map(|limit| limit.clamp(1, MAX_PAGE_SIZE));

        Self {
            tags,
            search,
            limit,
            offset: self.offset,
        }
    }

    pub fn matches(&self, record: &ContentRecord) -> bool {
        if !record.published {
            return false;
        }
        if !self.tags.is_empty() && !record.has_any_tag(&self.tags) {
            return false;
        }
        match self.search.as_deref() {
            None => true,
            Some(needle) => {
                let needle = needle.to_lowercase();
                record.title.to_lowercase().contains(&needle)
                    || record.excerpt_or_derived().to_lowercase().contains(&needle)
                    || record.body.to_lowercase().contains(&needle)
            }
        }
    }

    /// Filter, sort and paginate an in-memory record set.
    pub fn apply<I>(&self, records: I) -> ContentPage
    where
        I: IntoIterator<Item = ContentRecord>,
    {
        let mut matching: Vec<ContentRecord> =
            records.into_iter().filter(|r| self.matches(r)).collect();
        matching.sort_by(newest_first);

        let total = matching.len() as u64;
        let offset = usize::try_from(self.offset).unwrap_or(usize::MAX);
        let items = matching
            .into_iter()
            .skip(offset)
            .take(self.limit.map_or(usize::MAX, |limit| limit as usize))
            .collect();

        ContentPage { items, total }
    }

    /// Discriminating parameters for cache keys.
    pub fn cache_params(&self) -> Vec<String> {
        vec![
            format!("tags={}", self.tags.join(",")),
            format!("search={}", self.search.as_deref().unwrap_or("")),
            format!(
                "limit={}",
                self.limit.map(|l| l.to_string()).unwrap_or_default()
            ),
            format!("offset={}", self.offset),
        ]
    }
}

pub fn newest_first(left: &ContentRecord, right: &ContentRecord) -> Ordering {
    right
        .created_at
        .cmp(&left.created_at)
        .then_with(|| left.slug.cmp(&right.slug))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentPage {
    pub items: Vec<ContentRecord>,
    /// Filtered size before pagination.
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContentRecord {
    pub slug: String,
    pub title: String,
    pub body: String,
    pub excerpt: Option<String>,
    pub tags: BTreeSet<String>,
    pub published: bool,
    pub featured_image_url: Option<String>,
}

/// Partial update. `Some("")` clears `excerpt` or `featured_image_url`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentPatch {
    pub slug: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub excerpt: Option<String>,
    pub tags: Option<BTreeSet<String>>,
    pub published: Option<bool>,
    pub featured_image_url: Option<String>,
}

impl ContentPatch {
    pub fn is_empty(&self) -> bool {
        self.slug.is_none()
            && self.title.is_none()
            && self.body.is_none()
            && self.excerpt.is_none()
            && self.tags.is_none()
            && self.published.is_none()
            && self.featured_image_url.is_none()
    }

    /// Whether the tag listing may change as a result of this patch.
    pub fn touches_aggregates(&self) -> bool {
        self.tags.is_some() || self.published.is_some()
    }

    pub fn apply_to(&self, record: &mut ContentRecord) {
        if let Some(slug) = &self.slug {
            record.slug = slug.clone();
        }
        if let Some(title) = &self.title {
            record.title = title.clone();
        }
        if let Some(body) = &self.body {
            record.body = body.clone();
        }
        if let Some(excerpt) = &self.excerpt {
            record.excerpt = (!excerpt.is_empty()).then(|| excerpt.clone());
        }
        if let Some(tags) = &self.tags {
            record.tags = tags.clone();
        }
        if let Some(published) = self.published {
            record.published = published;
        }
        if let Some(url) = &self.featured_image_url {
            record.featured_image_url = (!url.is_empty()).then(|| url.clone());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub post_id: String,
    pub author_name: String,
    pub author_email: Option<String>,
    pub author_website: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContactMessage {
    pub name: String,
    pub email: String,
    pub subject: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactUpdate {
    pub status: ContactStatus,
    pub admin_notes: Option<String>,
}

#[async_trait]
pub trait ContentReadRepo: Send + Sync {
    async fn list_published(&self, query: &ContentQuery) -> Result<ContentPage, RepoError>;

    async fn find_by_slug(
        &self,
        slug: &str,
        scope: ReadScope,
    ) -> Result<Option<ContentRecord>, RepoError>;

    async fn list_tags(&self) -> Result<Vec<String>, RepoError>;
}

#[async_trait]
pub trait ContentWriteRepo: Send + Sync {
    async fn create_record(&self, params: NewContentRecord) -> Result<ContentRecord, RepoError>;

    async fn update_record(
        &self,
        id: &str,
        patch: ContentPatch,
    ) -> Result<ContentRecord, RepoError>;

    async fn delete_record(&self, id: &str) -> Result<(), RepoError>;

    async fn set_published(&self, id: &str, published: bool) -> Result<ContentRecord, RepoError>;
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    async fn list_approved(&self, post_id: &str) -> Result<Vec<Comment>, RepoError>;

    async fn create_comment(&self, params: NewComment) -> Result<Comment, RepoError>;

    async fn set_comment_status(
        &self,
        id: Uuid,
        status: CommentStatus,
    ) -> Result<Comment, RepoError>;

    /// Returns the removed comment so callers know which post it belonged to.
    async fn delete_comment(&self, id: Uuid) -> Result<Comment, RepoError>;
}

#[async_trait]
pub trait ContactRepo: Send + Sync {
    async fn submit_contact(&self, params: NewContactMessage)
    -> Result<ContactMessage, RepoError>;

    async fn update_contact(
        &self,
        id: Uuid,
        update: ContactUpdate,
    ) -> Result<ContactMessage, RepoError>;
}

/// Handles onto one dynamic backend, split by concern.
#[derive(Clone)]
pub struct Repositories {
    pub content: Arc<dyn ContentReadRepo>,
    pub content_writer: Arc<dyn ContentWriteRepo>,
    pub comments: Arc<dyn CommentsRepo>,
    pub contact: Arc<dyn ContactRepo>,
}

impl Repositories {
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: ContentReadRepo + ContentWriteRepo + CommentsRepo + ContactRepo + 'static,
    {
        Self {
            content: backend.clone(),
            content_writer: backend.clone(),
            comments: backend.clone(),
            contact: backend,
        }
    }
}
