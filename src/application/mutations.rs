//! Mutation coordinator.
//!
//! Every write goes to the live backend, never to the snapshot. A write is
//! refused up front when the probe reports the backend unavailable. On
//! success the affected cache entries are invalidated before the result is
//! returned; failed writes invalidate nothing and are never retried.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::application::availability::AvailabilityProbe;
use crate::application::commands::{
    CreateRecordCommand, SubmitCommentCommand, SubmitContactCommand, UpdateContactCommand,
    UpdateRecordCommand,
};
use crate::application::repos::{CommentsRepo, ContactRepo, ContentWriteRepo, RepoError};
use crate::cache::CacheTrigger;
use crate::domain::entities::{Comment, ContactMessage, ContentRecord};
use crate::domain::error::DomainError;
use crate::domain::types::CommentStatus;

pub(crate) const METRIC_MUTATION: &str = "folio_mutation_total";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MutationError {
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error("the live backend is unavailable; the site is read-only")]
    BackendUnavailable,
    #[error("resource not found")]
    NotFound,
    /// Rejected by the backend; message and code are passed through verbatim.
    #[error("{message}")]
    Backend {
        message: String,
        code: Option<String>,
    },
}

impl From<RepoError> for MutationError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Unavailable(_) | RepoError::Timeout => MutationError::BackendUnavailable,
            RepoError::NotFound => MutationError::NotFound,
            RepoError::Duplicate { constraint } => MutationError::Backend {
                message: format!("duplicate value violates unique constraint `{constraint}`"),
                code: Some("duplicate".to_string()),
            },
            RepoError::InvalidInput { message } => MutationError::Backend {
                message,
                code: Some("invalid_input".to_string()),
            },
            RepoError::Backend { message, code } => MutationError::Backend { message, code },
            RepoError::Decode(message) => MutationError::Backend {
                message,
                code: Some("decode".to_string()),
            },
        }
    }
}

impl MutationError {
    pub fn code(&self) -> Option<&str> {
        match self {
            MutationError::Validation(_) => Some("invalid_input"),
            MutationError::BackendUnavailable => Some("backend_unavailable"),
            MutationError::NotFound => Some("not_found"),
            MutationError::Backend { code, .. } => code.as_deref(),
        }
    }

    fn outcome(&self) -> &'static str {
        match self {
            MutationError::Validation(_) => "invalid",
            MutationError::BackendUnavailable => "unavailable",
            MutationError::NotFound => "not_found",
            MutationError::Backend { .. } => "rejected",
        }
    }
}

pub struct MutationCoordinator {
    probe: Arc<AvailabilityProbe>,
    content: Arc<dyn ContentWriteRepo>,
    comments: Arc<dyn CommentsRepo>,
    contact: Arc<dyn ContactRepo>,
    trigger: Arc<CacheTrigger>,
    timeout: Duration,
}

impl MutationCoordinator {
    pub fn new(
        probe: Arc<AvailabilityProbe>,
        content: Arc<dyn ContentWriteRepo>,
        comments: Arc<dyn CommentsRepo>,
        contact: Arc<dyn ContactRepo>,
        trigger: Arc<CacheTrigger>,
    ) -> Self {
        let timeout = probe.timeout();
        Self {
            probe,
            content,
            comments,
            contact,
            trigger,
            timeout,
        }
    }

    #[instrument(skip(self, command))]
    pub async fn create_record(
        &self,
        command: CreateRecordCommand,
    ) -> Result<ContentRecord, MutationError> {
        let outcome = async {
            let params = command.validate()?;
            self.ensure_available().await?;
            let record = self.call(self.content.create_record(params)).await?;
            self.trigger.record_created(&record.id, &record.slug);
            Ok::<_, MutationError>(record.with_derived_fields())
        }
        .await;
        finish("create_record", outcome)
    }

    #[instrument(skip(self, command))]
    pub async fn update_record(
        &self,
        id: &str,
        command: UpdateRecordCommand,
    ) -> Result<ContentRecord, MutationError> {
        let outcome = async {
            let patch = command.validate()?;
            self.ensure_available().await?;
            let aggregates_changed = patch.touches_aggregates();
            let record = self.call(self.content.update_record(id, patch)).await?;
            self.trigger
                .record_updated(&record.id, &record.slug, aggregates_changed);
            Ok::<_, MutationError>(record.with_derived_fields())
        }
        .await;
        finish("update_record", outcome)
    }

    #[instrument(skip(self))]
    pub async fn delete_record(&self, id: &str) -> Result<(), MutationError> {
        let outcome = async {
            self.ensure_available().await?;
            self.call(self.content.delete_record(id)).await?;
            self.trigger.record_deleted(id);
            Ok::<_, MutationError>(())
        }
        .await;
        finish("delete_record", outcome)
    }

    #[instrument(skip(self))]
    pub async fn toggle_published(
        &self,
        id: &str,
        published: bool,
    ) -> Result<ContentRecord, MutationError> {
        let outcome = async {
            self.ensure_available().await?;
            let record = self.call(self.content.set_published(id, published)).await?;
            self.trigger.publish_toggled(&record.id, &record.slug);
            Ok::<_, MutationError>(record.with_derived_fields())
        }
        .await;
        finish("toggle_published", outcome)
    }

    /// New comments are stored as pending.
    #[instrument(skip(self, command))]
    pub async fn submit_comment(
        &self,
        post_id: &str,
        command: SubmitCommentCommand,
    ) -> Result<Comment, MutationError> {
        let outcome = async {
            let params = command.validate(post_id)?;
            self.ensure_available().await?;
            let comment = self.call(self.comments.create_comment(params)).await?;
            self.trigger.comments_changed(&comment.post_id);
            Ok::<_, MutationError>(comment)
        }
        .await;
        finish("submit_comment", outcome)
    }

    #[instrument(skip(self))]
    pub async fn moderate_comment(
        &self,
        id: Uuid,
        status: CommentStatus,
    ) -> Result<Comment, MutationError> {
        let outcome = async {
            self.ensure_available().await?;
            let comment = self
                .call(self.comments.set_comment_status(id, status))
                .await?;
            self.trigger.comments_changed(&comment.post_id);
            Ok::<_, MutationError>(comment)
        }
        .await;
        finish("moderate_comment", outcome)
    }

    #[instrument(skip(self))]
    pub async fn delete_comment(&self, id: Uuid) -> Result<(), MutationError> {
        let outcome = async {
            self.ensure_available().await?;
            let comment = self.call(self.comments.delete_comment(id)).await?;
            self.trigger.comments_changed(&comment.post_id);
            Ok::<_, MutationError>(())
        }
        .await;
        finish("delete_comment", outcome)
    }

    #[instrument(skip(self, command))]
    pub async fn submit_contact(
        &self,
        command: SubmitContactCommand,
    ) -> Result<ContactMessage, MutationError> {
        let outcome = async {
            let params = command.validate()?;
            self.ensure_available().await?;
            Ok::<_, MutationError>(self.call(self.contact.submit_contact(params)).await?)
        }
        .await;
        finish("submit_contact", outcome)
    }

    #[instrument(skip(self, command))]
    pub async fn update_contact(
        &self,
        id: Uuid,
        command: UpdateContactCommand,
    ) -> Result<ContactMessage, MutationError> {
        let outcome = async {
            let update = command.validate()?;
            self.ensure_available().await?;
            Ok::<_, MutationError>(self.call(self.contact.update_contact(id, update)).await?)
        }
        .await;
        finish("update_contact", outcome)
    }

    async fn ensure_available(&self) -> Result<(), MutationError> {
        if self.probe.check_availability().await {
            Ok(())
        } else {
            Err(MutationError::BackendUnavailable)
        }
    }

    async fn call<T, F>(&self, call: F) -> Result<T, MutationError>
    where
        F: Future<Output = Result<T, RepoError>>,
    {
        tokio::time::timeout(self.timeout, call)
            .await
            .unwrap_or(Err(RepoError::Timeout))
            .map_err(MutationError::from)
    }
}

fn finish<T>(
    operation: &'static str,
    outcome: Result<T, MutationError>,
) -> Result<T, MutationError> {
    match &outcome {
        Ok(_) => {
            info!(operation, "Mutation applied");
            counter!(METRIC_MUTATION, "operation" => operation, "outcome" => "ok").increment(1);
        }
        Err(err) => {
            warn!(operation, error = %err, code = err.code(), "Mutation failed");
            counter!(METRIC_MUTATION, "operation" => operation, "outcome" => err.outcome())
                .increment(1);
        }
    }
    outcome
}
