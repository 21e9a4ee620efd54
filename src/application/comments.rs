//! Comment and contact services: public submissions and admin moderation.

use std::sync::Arc;

use tracing::instrument;
use uuid::Uuid;

use crate::application::commands::{
    SubmitCommentCommand, SubmitContactCommand, UpdateContactCommand,
};
use crate::application::mutations::{MutationCoordinator, MutationError};
use crate::application::reader::CachedReader;
use crate::application::resolver::{Resolved, SourceResolver};
use crate::cache::QueryKey;
use crate::domain::entities::{Comment, ContactMessage};
use crate::domain::types::CommentStatus;

/// Reader comments: approved ones through the cache, writes through the
/// mutation coordinator.
#[derive(Clone)]
pub struct CommentService {
    resolver: Arc<SourceResolver>,
    mutations: Arc<MutationCoordinator>,
    reader: CachedReader,
}

impl CommentService {
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
    pub async fn approved_comments(&self, post_id: &str) -> Resolved<Vec<Comment>> {
        let resolver = self.resolver.clone();
        let owned = post_id.to_string();
        self.reader
            .read(QueryKey::approved_comments(post_id), Vec::new(), move || {
                let resolver = resolver.clone();
                let post_id = owned.clone();
                async move { resolver.approved_comments(&post_id).await }
            })
            .await
    }

    pub async fn submit_comment(
        &self,
        post_id: &str,
        command: SubmitCommentCommand,
    ) -> Result<Comment, MutationError> {
        self.mutations.submit_comment(post_id, command).await
    }

    pub async fn moderate_comment(
        &self,
        id: Uuid,
        status: CommentStatus,
    ) -> Result<Comment, MutationError> {
        self.mutations.moderate_comment(id, status).await
    }

    pub async fn delete_comment(&self, id: Uuid) -> Result<(), MutationError> {
        self.mutations.delete_comment(id).await
    }
}

/// Contact form submissions. Write-only from the site's point of view.
#[derive(Clone)]
pub struct ContactService {
    mutations: Arc<MutationCoordinator>,
}

impl ContactService {
    pub fn new(mutations: Arc<MutationCoordinator>) -> Self {
        Self { mutations }
    }

    pub async fn submit(
        &self,
        command: SubmitContactCommand,
    ) -> Result<ContactMessage, MutationError> {
        self.mutations.submit_contact(command).await
    }

    pub async fn update_status(
        &self,
        id: Uuid,
        command: UpdateContactCommand,
    ) -> Result<ContactMessage, MutationError> {
        self.mutations.update_contact(id, command).await
    }
}
