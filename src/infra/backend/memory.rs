use std::collections::BTreeSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    CommentsRepo, ContactRepo, ContactUpdate, ContentPage, ContentPatch, ContentQuery,
    ContentReadRepo, ContentWriteRepo, NewComment, NewContactMessage, NewContentRecord, ReadScope,
    RepoError,
};
use crate::cache::lock::mutex_lock;
use crate::domain::entities::{Comment, ContactMessage, ContentRecord};
use crate::domain::types::{CommentStatus, ContactStatus};

const SOURCE: &str = "infra::backend::memory";

#[derive(Default)]
struct MemoryState {
    posts: Vec<ContentRecord>,
    comments: Vec<Comment>,
    contacts: Vec<ContactMessage>,
    next_id: u64,
}

/// Process-local backend with switchable availability, injected failures
/// and artificial latency.
#[derive(Default)]
pub struct InMemoryBackend {
    state: Mutex<MemoryState>,
    offline: AtomicBool,
    failure: Mutex<Option<RepoError>>,
    latency: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<ContentRecord>) -> Self {
        let next_id = records
            .iter()
            .filter_map(|record| record.id.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        Self {
            state: Mutex::new(MemoryState {
                posts: records,
                next_id,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// While offline every call fails as unreachable.
    pub fn set_online(&self, online: bool) {
        self.offline.store(!online, Ordering::SeqCst);
    }

    /// Every call fails with `failure` until cleared with `None`.
    pub fn fail_with(&self, failure: Option<RepoError>) {
        *mutex_lock(&self.failure, SOURCE, "fail_with") = failure;
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        *mutex_lock(&self.latency, SOURCE, "set_latency") = latency;
    }

    /// Calls received, including refused ones.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn reset_calls(&self) {
        self.calls.store(0, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<ContentRecord> {
        mutex_lock(&self.state, SOURCE, "records").posts.clone()
    }

    pub fn seed_comment(&self, comment: Comment) {
        mutex_lock(&self.state, SOURCE, "seed_comment")
            .comments
            .push(comment);
    }

    pub fn contacts(&self) -> Vec<ContactMessage> {
        mutex_lock(&self.state, SOURCE, "contacts").contacts.clone()
    }

    async fn enter(&self) -> Result<(), RepoError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let latency = *mutex_lock(&self.latency, SOURCE, "enter.latency");
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(RepoError::Unavailable("connection refused".to_string()));
        }
        match mutex_lock(&self.failure, SOURCE, "enter.failure").clone() {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }
}

fn slug_taken(posts: &[ContentRecord], slug: &str, except_id: Option<&str>) -> bool {
    posts
        .iter()
        .any(|post| post.slug == slug && Some(post.id.as_str()) != except_id)
}

fn duplicate_slug() -> RepoError {
    RepoError::Duplicate {
        constraint: "posts_slug_key".to_string(),
    }
}

#[async_trait]
impl ContentReadRepo for InMemoryBackend {
    async fn list_published(&self, query: &ContentQuery) -> Result<ContentPage, RepoError> {
        self.enter().await?;
        let posts = self.records();
        Ok(query.apply(posts))
    }

    async fn find_by_slug(
        &self,
        slug: &str,
        scope: ReadScope,
    ) -> Result<Option<ContentRecord>, RepoError> {
        self.enter().await?;
        let state = mutex_lock(&self.state, SOURCE, "find_by_slug");
        Ok(state
            .posts
            .iter()
            .find(|post| post.slug == slug && (post.published || scope == ReadScope::Admin))
            .cloned())
    }

    async fn list_tags(&self) -> Result<Vec<String>, RepoError> {
        self.enter().await?;
        let state = mutex_lock(&self.state, SOURCE, "list_tags");
        Ok(state
            .posts
            .iter()
            .filter(|post| post.published)
            .flat_map(|post| post.tags.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect())
    }
}

#[async_trait]
impl ContentWriteRepo for InMemoryBackend {
    async fn create_record(&self, params: NewContentRecord) -> Result<ContentRecord, RepoError> {
        self.enter().await?;
        let mut state = mutex_lock(&self.state, SOURCE, "create_record");
        if slug_taken(&state.posts, &params.slug, None) {
            return Err(duplicate_slug());
        }

        state.next_id += 1;
        let now = OffsetDateTime::now_utc();
        let record = ContentRecord {
            id: state.next_id.to_string(),
            slug: params.slug,
            title: params.title,
            body: params.body,
            excerpt: params.excerpt,
            tags: params.tags,
            published: params.published,
            featured_image_url: params.featured_image_url,
            created_at: now,
            updated_at: now,
            reading_time_minutes: 0,
        }
        .with_derived_fields();
        state.posts.push(record.clone());
        Ok(record)
    }

    async fn update_record(&self, id: &str, patch: ContentPatch) -> Result<ContentRecord, RepoError> {
        self.enter().await?;
        let mut state = mutex_lock(&self.state, SOURCE, "update_record");
        if let Some(slug) = &patch.slug
            && slug_taken(&state.posts, slug, Some(id))
        {
            return Err(duplicate_slug());
        }

        let post = state
            .posts
            .iter_mut()
            .find(|post| post.id == id)
            .ok_or(RepoError::NotFound)?;
        patch.apply_to(post);
        post.updated_at = OffsetDateTime::now_utc();
        let updated = post.clone().with_derived_fields();
        *post = updated.clone();
        Ok(updated)
    }

    async fn delete_record(&self, id: &str) -> Result<(), RepoError> {
        self.enter().await?;
        let mut state = mutex_lock(&self.state, SOURCE, "delete_record");
        let before = state.posts.len();
        state.posts.retain(|post| post.id != id);
        if state.posts.len() == before {
            return Err(RepoError::NotFound);
        }
        state.comments.retain(|comment| comment.post_id != id);
        Ok(())
    }

    async fn set_published(&self, id: &str, published: bool) -> Result<ContentRecord, RepoError> {
        self.enter().await?;
        let mut state = mutex_lock(&self.state, SOURCE, "set_published");
        let post = state
            .posts
            .iter_mut()
            .find(|post| post.id == id)
            .ok_or(RepoError::NotFound)?;
        post.published = published;
        post.updated_at = OffsetDateTime::now_utc();
        Ok(post.clone())
    }
}

#[async_trait]
impl CommentsRepo for InMemoryBackend {
    async fn list_approved(&self, post_id: &str) -> Result<Vec<Comment>, RepoError> {
        self.enter().await?;
        let state = mutex_lock(&self.state, SOURCE, "list_approved");
        let mut approved: Vec<Comment> = state
            .comments
            .iter()
            .filter(|comment| comment.post_id == post_id && comment.status.is_public())
            .cloned()
            .collect();
        approved.sort_by_key(|comment| comment.created_at);
        Ok(approved)
    }

    async fn create_comment(&self, params: NewComment) -> Result<Comment, RepoError> {
        self.enter().await?;
        let mut state = mutex_lock(&self.state, SOURCE, "create_comment");
        if !state.posts.iter().any(|post| post.id == params.post_id) {
            return Err(RepoError::backend(
                format!("post `{}` does not exist", params.post_id),
                Some("23503".to_string()),
            ));
        }

        let comment = Comment {
            id: Uuid::new_v4(),
            post_id: params.post_id,
            author_name: params.author_name,
            author_email: params.author_email,
            author_website: params.author_website,
            body: params.body,
            status: CommentStatus::Pending,
            created_at: OffsetDateTime::now_utc(),
        };
        state.comments.push(comment.clone());
        Ok(comment)
    }

    async fn set_comment_status(
        &self,
        id: Uuid,
        status: CommentStatus,
    ) -> Result<Comment, RepoError> {
        self.enter().await?;
        let mut state = mutex_lock(&self.state, SOURCE, "set_comment_status");
        let comment = state
            .comments
            .iter_mut()
            .find(|comment| comment.id == id)
            .ok_or(RepoError::NotFound)?;
        comment.status = status;
        Ok(comment.clone())
    }

    async fn delete_comment(&self, id: Uuid) -> Result<Comment, RepoError> {
        self.enter().await?;
        let mut state = mutex_lock(&self.state, SOURCE, "delete_comment");
        let index = state
            .comments
            .iter()
            .position(|comment| comment.id == id)
            .ok_or(RepoError::NotFound)?;
        Ok(state.comments.remove(index))
    }
}

#[async_trait]
impl ContactRepo for InMemoryBackend {
    async fn submit_contact(&self, params: NewContactMessage) -> Result<ContactMessage, RepoError> {
        self.enter().await?;
        let now = OffsetDateTime::now_utc();
        let message = ContactMessage {
            id: Uuid::new_v4(),
            name: params.name,
            email: params.email,
            subject: params.subject,
            message: params.message,
            status: ContactStatus::Unread,
            admin_notes: None,
            created_at: now,
            updated_at: now,
        };
        mutex_lock(&self.state, SOURCE, "submit_contact")
            .contacts
            .push(message.clone());
        Ok(message)
    }

    async fn update_contact(
        &self,
        id: Uuid,
        update: ContactUpdate,
    ) -> Result<ContactMessage, RepoError> {
        self.enter().await?;
        let mut state = mutex_lock(&self.state, SOURCE, "update_contact");
        let message = state
            .contacts
            .iter_mut()
            .find(|message| message.id == id)
            .ok_or(RepoError::NotFound)?;
        message.status = update.status;
        if update.admin_notes.is_some() {
            message.admin_notes = update.admin_notes;
        }
        message.updated_at = OffsetDateTime::now_utc();
        Ok(message.clone())
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn record(id: &str, slug: &str, published: bool) -> ContentRecord {
        ContentRecord {
            id: id.to_string(),
            slug: slug.to_string(),
            title: slug.to_string(),
            body: "body".to_string(),
            excerpt: None,
            tags: ["rust".to_string()].into_iter().collect(),
            published,
            featured_image_url: None,
            created_at: datetime!(2024-01-01 00:00 UTC),
            updated_at: datetime!(2024-01-01 00:00 UTC),
            reading_time_minutes: 1,
        }
    }

    fn new_record(slug: &str) -> NewContentRecord {
        NewContentRecord {
            slug: slug.to_string(),
            title: "Title".to_string(),
            body: "Body".to_string(),
            excerpt: None,
            tags: BTreeSet::new(),
            published: false,
            featured_image_url: None,
        }
    }

    #[tokio::test]
    async fn ids_continue_after_seeded_records() {
        let backend = InMemoryBackend::with_records(vec![record("41", "a", true)]);
        let created = backend.create_record(new_record("b")).await.expect("created");
        assert_eq!(created.id, "42");
    }

    #[tokio::test]
    async fn duplicate_slug_is_rejected() {
        let backend = InMemoryBackend::with_records(vec![record("1", "taken", true)]);
        let err = backend
            .create_record(new_record("taken"))
            .await
            .expect_err("duplicate");
        assert!(matches!(err, RepoError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn public_scope_hides_drafts() {
        let backend = InMemoryBackend::with_records(vec![record("1", "draft", false)]);
        assert!(
            backend
                .find_by_slug("draft", ReadScope::Public)
                .await
                .expect("ok")
                .is_none()
        );
        assert!(
            backend
                .find_by_slug("draft", ReadScope::Admin)
                .await
                .expect("ok")
                .is_some()
        );
    }

    #[tokio::test]
    async fn offline_and_injected_failures_are_reported() {
        let backend = InMemoryBackend::new();
        backend.set_online(false);
        assert!(
            backend
                .list_tags()
                .await
                .expect_err("offline")
                .is_transient()
        );

        backend.set_online(true);
        backend.fail_with(Some(RepoError::backend("boom", None)));
        assert!(matches!(
            backend.list_tags().await,
            Err(RepoError::Backend { .. })
        ));
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn comments_require_existing_post() {
        let backend = InMemoryBackend::new();
        let err = backend
            .create_comment(NewComment {
                post_id: "missing".into(),
                author_name: "Ada".into(),
                author_email: None,
                author_website: None,
                body: "hi".into(),
            })
            .await
            .expect_err("no post");
        assert_eq!(err.code(), Some("23503"));
    }
}
