//! Dynamic backend adapters.
//!
//! - [`RestBackend`]: PostgREST-style HTTP API (the production backend).
//! - [`InMemoryBackend`]: process-local store with fault injection, used by
//!   tests and for running the site without a remote service.
//! - [`OfflineBackend`]: stands in when no backend is configured; every call
//!   fails as unreachable so reads are served from the snapshot.

mod memory;
mod rest;

use async_trait::async_trait;
use uuid::Uuid;

use crate::application::repos::{
    CommentsRepo, ContactRepo, ContactUpdate, ContentPage, ContentPatch, ContentQuery,
    ContentReadRepo, ContentWriteRepo, NewComment, NewContactMessage, NewContentRecord, ReadScope,
    RepoError,
};
use crate::domain::entities::{Comment, ContactMessage, ContentRecord};
use crate::domain::types::CommentStatus;

pub use memory::InMemoryBackend;
pub use rest::RestBackend;

#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineBackend;

impl OfflineBackend {
    fn refuse<T>(&self) -> Result<T, RepoError> {
        Err(RepoError::Unavailable("no backend configured".to_string()))
    }
}

#[async_trait]
impl ContentReadRepo for OfflineBackend {
    async fn list_published(&self, _query: &ContentQuery) -> Result<ContentPage, RepoError> {
        self.refuse()
    }

    async fn find_by_slug(
        &self,
        _slug: &str,
        _scope: ReadScope,
    ) -> Result<Option<ContentRecord>, RepoError> {
        self.refuse()
    }

    async fn list_tags(&self) -> Result<Vec<String>, RepoError> {
        self.refuse()
    }
}

#[async_trait]
impl ContentWriteRepo for OfflineBackend {
    async fn create_record(&self, _params: NewContentRecord) -> Result<ContentRecord, RepoError> {
        self.refuse()
    }

    async fn update_record(
        &self,
        _id: &str,
        _patch: ContentPatch,
    ) -> Result<ContentRecord, RepoError> {
        self.refuse()
    }

    async fn delete_record(&self, _id: &str) -> Result<(), RepoError> {
        self.refuse()
    }

    async fn set_published(&self, _id: &str, _published: bool) -> Result<ContentRecord, RepoError> {
        self.refuse()
    }
}

#[async_trait]
impl CommentsRepo for OfflineBackend {
    async fn list_approved(&self, _post_id: &str) -> Result<Vec<Comment>, RepoError> {
        self.refuse()
    }

    async fn create_comment(&self, _params: NewComment) -> Result<Comment, RepoError> {
        self.refuse()
    }

    async fn set_comment_status(
        &self,
        _id: Uuid,
        _status: CommentStatus,
    ) -> Result<Comment, RepoError> {
        self.refuse()
    }

    async fn delete_comment(&self, _id: Uuid) -> Result<Comment, RepoError> {
        self.refuse()
    }
}

#[async_trait]
impl ContactRepo for OfflineBackend {
    async fn submit_contact(
        &self,
        _params: NewContactMessage,
    ) -> Result<ContactMessage, RepoError> {
        self.refuse()
    }

    async fn update_contact(
        &self,
        _id: Uuid,
        _update: ContactUpdate,
    ) -> Result<ContactMessage, RepoError> {
        self.refuse()
    }
}
