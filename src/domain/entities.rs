//! Domain entities as exchanged with the content backend and the static snapshot.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::content::{derive_excerpt, reading_time_minutes};
use crate::domain::types::{CommentStatus, ContactStatus};

/// A blog post, as seen by readers and by the admin surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub body: String,
    pub excerpt: Option<String>,
    pub tags: BTreeSet<String>,
    pub published: bool,
    pub featured_image_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(default)]
    pub reading_time_minutes: u32,
}

impl ContentRecord {
    /// Fill in the fields every source must expose identically: the derived
    /// excerpt (when the source has none) and the reading-time estimate.
    pub fn with_derived_fields(mut self) -> Self {
        if self
            .excerpt
            .as_deref()
            .is_none_or(|value| value.trim().is_empty())
        {
            self.excerpt = Some(derive_excerpt(&self.body));
        }
        self.reading_time_minutes = reading_time_minutes(&self.body);
        self
    }

    pub fn excerpt_or_derived(&self) -> String {
        match self.excerpt.as_deref() {
            Some(excerpt) if !excerpt.trim().is_empty() => excerpt.to_string(),
            _ => derive_excerpt(&self.body),
        }
    }

    pub fn has_any_tag<'a>(&self, wanted: impl IntoIterator<Item = &'a String>) -> bool {
        wanted.into_iter().any(|tag| self.tags.contains(tag))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: String,
    pub author_name: String,
    pub author_email: Option<String>,
    pub author_website: Option<String>,
    pub body: String,
    pub status: CommentStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactMessage {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub subject: Option<String>,
    pub message: String,
    pub status: ContactStatus,
    pub admin_notes: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}
