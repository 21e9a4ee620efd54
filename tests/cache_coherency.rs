mod common;

use std::time::Duration;

use common::{harness, record, slugs};
use folio::application::commands::{
    CreateRecordCommand, SubmitCommentCommand, UpdateRecordCommand,
};
use folio::application::mutations::MutationError;
use folio::application::repos::{ContentQuery, ContentWriteRepo, NewContentRecord, ReadScope};
use folio::cache::QueryKey;
use folio::domain::types::CommentStatus;

fn all() -> ContentQuery {
    ContentQuery::default()
}

#[tokio::test]
async fn publishing_a_draft_shows_up_in_a_cached_listing() {
    let h = harness(vec![
        record("41", "already-live", &["rust"], true),
        record("42", "the-draft", &["rust"], false),
    ]);

    let before = h.services.content.get_published_records(all()).await;
    assert_eq!(slugs(&before.data), vec!["already-live"]);
    assert!(
        h.services
            .cache
            .contains(&QueryKey::content_list(&all().normalized()))
    );

    h.services
        .content
        .update_record(
            "42",
            UpdateRecordCommand {
                published: Some(true),
                ..Default::default()
            },
        )
        .await
        .expect("update succeeds");

    let after = h.services.content.get_published_records(all()).await;
    assert!(after.data.iter().any(|record| record.id == "42"));
    assert_eq!(after.count, Some(2));
}

#[tokio::test]
async fn repeated_reads_are_served_from_cache() {
    let h = harness(vec![record("1", "only", &["rust"], true)]);

    h.services.content.get_published_records(all()).await;
    h.services.content.list_tags().await;
    let calls = h.backend.call_count();

    h.services.content.get_published_records(all()).await;
    h.services.content.list_tags().await;
    assert_eq!(h.backend.call_count(), calls);
}

#[tokio::test]
async fn creating_a_record_refreshes_listing_and_tags() {
    let h = harness(vec![record("1", "only", &["rust"], true)]);

    let tags = h.services.content.list_tags().await;
    assert_eq!(tags.data, vec!["rust".to_string()]);
    h.services.content.get_published_records(all()).await;

    h.services
        .content
        .create_record(CreateRecordCommand {
            title: "Zig Notes".into(),
            body: "Comptime all the things.".into(),
            tags: vec!["Zig".into()],
            published: true,
            ..Default::default()
        })
        .await
        .expect("create succeeds");

    let tags = h.services.content.list_tags().await;
    assert_eq!(tags.data, vec!["rust".to_string(), "zig".to_string()]);
    let listing = h.services.content.get_published_records(all()).await;
    assert!(listing.data.iter().any(|record| record.slug == "zig-notes"));
}

#[tokio::test]
async fn negative_slug_lookup_is_invalidated_by_create() {
    let h = harness(vec![record("1", "only", &["rust"], true)]);

    let missing = h
        .services
        .content
        .get_record_by_slug("brand-new", false)
        .await
        .expect("public read");
    assert_eq!(missing.data, None);
    assert!(
        h.services
            .cache
            .contains(&QueryKey::content_detail("brand-new", ReadScope::Public))
    );

    h.services
        .content
        .create_record(CreateRecordCommand {
            title: "Brand New".into(),
            body: "Fresh.".into(),
            slug: Some("brand-new".into()),
            published: true,
            ..Default::default()
        })
        .await
        .expect("create succeeds");

    let found = h
        .services
        .content
        .get_record_by_slug("brand-new", false)
        .await
        .expect("public read");
    assert_eq!(found.data.map(|record| record.slug), Some("brand-new".into()));
}

#[tokio::test]
async fn renaming_a_slug_drops_the_old_detail_entry() {
    let h = harness(vec![record("7", "old-name", &["rust"], true)]);

    let old = h
        .services
        .content
        .get_record_by_slug("old-name", false)
        .await
        .expect("public read");
    assert!(old.data.is_some());

    h.services
        .content
        .update_record(
            "7",
            UpdateRecordCommand {
                slug: Some("new-name".into()),
                ..Default::default()
            },
        )
        .await
        .expect("rename succeeds");

    let old = h
        .services
        .content
        .get_record_by_slug("old-name", false)
        .await
        .expect("public read");
    assert_eq!(old.data, None);
    let new = h
        .services
        .content
        .get_record_by_slug("new-name", false)
        .await
        .expect("public read");
    assert_eq!(new.data.map(|record| record.id), Some("7".into()));
}

#[tokio::test]
async fn deleting_a_record_removes_it_everywhere() {
    let h = harness(vec![
        record("1", "keep", &["rust"], true),
        record("2", "remove", &["go"], true),
    ]);

    h.services.content.get_published_records(all()).await;
    h.services.content.list_tags().await;
    h.services
        .content
        .get_record_by_slug("remove", false)
        .await
        .expect("public read");

    h.services
        .content
        .delete_record("2")
        .await
        .expect("delete succeeds");

    let listing = h.services.content.get_published_records(all()).await;
    assert_eq!(slugs(&listing.data), vec!["keep"]);
    let tags = h.services.content.list_tags().await;
    assert_eq!(tags.data, vec!["rust".to_string()]);
    let detail = h
        .services
        .content
        .get_record_by_slug("remove", false)
        .await
        .expect("public read");
    assert_eq!(detail.data, None);
}

#[tokio::test]
async fn failed_mutations_leave_the_cache_alone() {
    let h = harness(vec![record("1", "only", &["rust"], true)]);
    h.services.content.get_published_records(all()).await;
    h.services.content.list_tags().await;
    let entries = h.services.cache.len();

    h.backend.set_online(false);
    h.services.content.reset_probe().await;

    let err = h
        .services
        .content
        .create_record(CreateRecordCommand {
            title: "Offline".into(),
            body: "Nope.".into(),
            published: true,
            ..Default::default()
        })
        .await
        .expect_err("backend is down");
    assert!(matches!(err, MutationError::BackendUnavailable));

    let err = h
        .services
        .content
        .toggle_published("1", false)
        .await
        .expect_err("backend is down");
    assert!(matches!(err, MutationError::BackendUnavailable));

    assert_eq!(h.services.cache.len(), entries);
    assert!(h.services.cache.contains(&QueryKey::tags()));
}

#[tokio::test]
async fn invalid_commands_never_reach_the_backend() {
    let h = harness(Vec::new());
    let calls = h.backend.call_count();

    let err = h
        .services
        .content
        .create_record(CreateRecordCommand {
            title: "   ".into(),
            body: "Body".into(),
            ..Default::default()
        })
        .await
        .expect_err("blank title");
    assert!(matches!(err, MutationError::Validation(_)));

    let err = h
        .services
        .content
        .update_record("1", UpdateRecordCommand::default())
        .await
        .expect_err("empty patch");
    assert!(matches!(err, MutationError::Validation(_)));

    assert_eq!(h.backend.call_count(), calls);
}

#[tokio::test]
async fn approved_comments_follow_moderation() {
    let h = harness(vec![record("1", "post", &["rust"], true)]);

    let empty = h.services.comments.approved_comments("1").await;
    assert!(empty.data.is_empty());

    let comment = h
        .services
        .comments
        .submit_comment(
            "1",
            SubmitCommentCommand {
                author_name: "Ada".into(),
                body: "Lovely post.".into(),
                ..Default::default()
            },
        )
        .await
        .expect("submitted");
    assert_eq!(comment.status, CommentStatus::Pending);
    assert!(h.services.comments.approved_comments("1").await.data.is_empty());

    h.services
        .comments
        .moderate_comment(comment.id, CommentStatus::Approved)
        .await
        .expect("approved");
    let approved = h.services.comments.approved_comments("1").await;
    assert_eq!(approved.data.len(), 1);
    assert_eq!(approved.count, Some(1));

    h.services
        .comments
        .delete_comment(comment.id)
        .await
        .expect("deleted");
    assert!(h.services.comments.approved_comments("1").await.data.is_empty());
}

#[tokio::test(start_paused = true)]
async fn expired_entries_are_served_stale_then_refreshed() {
    let h = harness(vec![record("1", "first", &["rust"], true)]);

    let first = h.services.content.get_published_records(all()).await;
    assert_eq!(slugs(&first.data), vec!["first"]);

    // A change made behind the coordinator's back.
    h.backend
        .create_record(NewContentRecord {
            slug: "second".into(),
            title: "Second".into(),
            body: "Body".into(),
            excerpt: None,
            tags: Default::default(),
            published: true,
            featured_image_url: None,
        })
        .await
        .expect("direct insert");

    tokio::time::advance(Duration::from_secs(301)).await;

    let stale = h.services.content.get_published_records(all()).await;
    assert_eq!(slugs(&stale.data), vec!["first"]);

    tokio::time::sleep(Duration::from_millis(10)).await;

    let refreshed = h.services.content.get_published_records(all()).await;
    assert_eq!(refreshed.data.len(), 2);
}
