//! Static snapshot store.
//!
//! An immutable collection of content records bundled into the binary at
//! build time. A file path from configuration may replace the bundled copy;
//! either way the records are parsed and validated once and then served from
//! memory with the same filter semantics as the live backend.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use time::OffsetDateTime;

use crate::application::repos::{ContentPage, ContentQuery, newest_first};
use crate::domain::content::normalize_tags;
use crate::domain::entities::ContentRecord;
use crate::domain::slug::validate_slug;

const BUNDLED_SNAPSHOT: &str = include_str!("../../content/snapshot.json");

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("snapshot is not a valid record array: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("duplicate slug `{slug}` in snapshot")]
    DuplicateSlug { slug: String },
    #[error("duplicate id `{id}` in snapshot")]
    DuplicateId { id: String },
    #[error("snapshot record `{id}` is invalid: {reason}")]
    InvalidRecord { id: String, reason: String },
}

/// On-disk shape. Fields the live backend always sends may be absent here.
#[derive(Debug, Deserialize)]
struct SnapshotRecord {
    id: String,
    slug: String,
    title: String,
    body: String,
    #[serde(default)]
    excerpt: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default = "published_by_default")]
    published: bool,
    #[serde(default)]
    featured_image_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    updated_at: Option<OffsetDateTime>,
}

fn published_by_default() -> bool {
    true
}

impl SnapshotRecord {
    fn into_record(self) -> Result<ContentRecord, SnapshotError> {
        validate_slug(&self.slug).map_err(|err| SnapshotError::InvalidRecord {
            id: self.id.clone(),
            reason: err.to_string(),
        })?;
        let tags = normalize_tags(&self.tags).map_err(|err| SnapshotError::InvalidRecord {
            id: self.id.clone(),
            reason: err.to_string(),
        })?;

        Ok(ContentRecord {
            updated_at: self.updated_at.unwrap_or(self.created_at),
            id: self.id,
            slug: self.slug,
            title: self.title,
            body: self.body,
            excerpt: self.excerpt,
            tags,
            published: self.published,
            featured_image_url: self.featured_image_url,
            created_at: self.created_at,
            reading_time_minutes: 0,
        }
        .with_derived_fields())
    }
}

/// Counts reported by `folio snapshot check`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotSummary {
    pub records: usize,
    pub published: usize,
    pub drafts: usize,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    /// Newest first.
    records: Vec<ContentRecord>,
}

impl SnapshotStore {
    /// The snapshot compiled into the binary.
    pub fn bundled() -> Result<Self, SnapshotError> {
        Self::from_json(BUNDLED_SNAPSHOT)
    }

    /// Load from `path`, or the bundled snapshot when no path is configured.
    pub async fn load(path: Option<&Path>) -> Result<Self, SnapshotError> {
        match path {
            None => Self::bundled(),
            Some(path) => {
                let json = tokio::fs::read_to_string(path).await.map_err(|source| {
                    SnapshotError::Io {
                        path: path.display().to_string(),
                        source,
                    }
                })?;
                Self::from_json(&json)
            }
        }
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let raw: Vec<SnapshotRecord> = serde_json::from_str(json)?;
        let records = raw
            .into_iter()
            .map(SnapshotRecord::into_record)
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_records(records)
    }

    pub fn from_records(mut records: Vec<ContentRecord>) -> Result<Self, SnapshotError> {
        let mut slugs = HashSet::new();
        let mut ids = HashSet::new();
        for record in &records {
            if !slugs.insert(record.slug.as_str()) {
                return Err(SnapshotError::DuplicateSlug {
                    slug: record.slug.clone(),
                });
            }
            if !ids.insert(record.id.as_str()) {
                return Err(SnapshotError::DuplicateId {
                    id: record.id.clone(),
                });
            }
        }

        records.sort_by(newest_first);
        Ok(Self { records })
    }

    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Published records matching `query`, filtered, sorted and paginated
    /// exactly like the live backend's listing.
    pub fn list_snapshot_records(&self, query: &ContentQuery) -> ContentPage {
        query.apply(self.records.iter().cloned())
    }

    /// Published record by slug.
    pub fn find_by_slug(&self, slug: &str) -> Option<ContentRecord> {
        self.records
            .iter()
            .find(|record| record.published && record.slug == slug)
            .cloned()
    }

    /// Sorted, distinct tags of published records.
    pub fn tags(&self) -> Vec<String> {
        self.records
            .iter()
            .filter(|record| record.published)
            .flat_map(|record| record.tags.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn summary(&self) -> SnapshotSummary {
        let published = self.records.iter().filter(|r| r.published).count();
        SnapshotSummary {
            records: self.records.len(),
            published,
            drafts: self.records.len() - published,
            tags: self.tags(),
        }
    }

    pub fn records(&self) -> &[ContentRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
