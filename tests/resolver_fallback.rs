mod common;

use std::time::Duration;

use common::{harness, harness_with, record, record_at, settings, slugs};
use folio::application::repos::{ContentQuery, RepoError};
use folio::application::resolver::{FallbackPolicy, ResolveError};
use folio::domain::types::DataSource;
use folio::infra::snapshot::SnapshotStore;
use time::macros::datetime;

fn tagged(tags: &[&str]) -> ContentQuery {
    ContentQuery {
        tags: tags.iter().map(|tag| tag.to_string()).collect(),
        ..Default::default()
    }
}

#[tokio::test]
async fn tag_filter_is_served_from_snapshot_when_backend_is_down() {
    let h = harness(vec![record("100", "live-only", &["go"], true)]);
    h.backend.set_online(false);

    let resolved = h
        .services
        .content
        .get_published_records(tagged(&["go"]))
        .await;

    assert_eq!(
        slugs(&resolved.data),
        vec![
            "profiling-a-go-service",
            "ownership-for-go-developers",
            "go-channels-in-practice",
        ]
    );
    assert_eq!(resolved.count, Some(3));
    assert_eq!(resolved.error, None);
}

#[tokio::test]
async fn offline_reads_equal_snapshot_output_for_the_same_filter() {
    let h = harness(vec![record("100", "live-only", &["rust"], true)]);
    h.backend.set_online(false);
    let snapshot = SnapshotStore::bundled().expect("bundled snapshot");

    let queries = [
        ContentQuery::default(),
        tagged(&["rust"]),
        tagged(&["RUST", "meta"]),
        ContentQuery {
            search: Some("tokio".into()),
            ..Default::default()
        },
        ContentQuery {
            limit: Some(2),
            offset: 1,
            ..Default::default()
        },
        tagged(&["nothing-has-this"]),
    ];

    for query in queries {
        let expected = snapshot.list_snapshot_records(&query.clone().normalized());
        let resolved = h.services.content.get_published_records(query).await;
        assert_eq!(resolved.data, expected.items);
        assert_eq!(resolved.count, Some(expected.total));
        assert_eq!(resolved.error, None);
    }
}

#[tokio::test]
async fn live_reads_return_counted_results_without_error() {
    let h = harness(vec![
        record_at("1", "older", &["rust"], true, datetime!(2025-01-01 00:00 UTC)),
        record_at("2", "newer", &["rust"], true, datetime!(2025-02-01 00:00 UTC)),
        record_at("3", "draft", &["rust"], false, datetime!(2025-03-01 00:00 UTC)),
    ]);

    let resolved = h
        .services
        .content
        .get_published_records(ContentQuery {
            limit: Some(1),
            ..Default::default()
        })
        .await;

    assert_eq!(slugs(&resolved.data), vec!["newer"]);
    assert_eq!(resolved.count, Some(2));
    assert_eq!(resolved.error, None);

    let info = h.services.content.get_data_source_info().await;
    assert!(info.is_dynamic_available);
    assert_eq!(info.data_source, DataSource::Dynamic);
}

#[tokio::test]
async fn unpublished_live_record_is_not_found_publicly() {
    let h = harness(vec![record("42", "secret-draft", &["rust"], false)]);

    let public = h
        .services
        .content
        .get_record_by_slug("secret-draft", false)
        .await
        .expect("public reads never fail");
    assert_eq!(public.data, None);
    assert_eq!(public.error, None);

    let admin = h
        .services
        .content
        .get_record_by_slug("secret-draft", true)
        .await
        .expect("backend is up");
    assert_eq!(admin.data.map(|record| record.id), Some("42".to_string()));
}

#[tokio::test]
async fn admin_lookup_fails_instead_of_falling_back() {
    let h = harness(Vec::new());
    h.backend.set_online(false);

    let err = h
        .services
        .content
        .get_record_by_slug("hello-world", true)
        .await
        .expect_err("admin reads need the live backend");
    assert_eq!(err, ResolveError::BackendUnavailable);

    let public = h
        .services
        .content
        .get_record_by_slug("hello-world", false)
        .await
        .expect("public reads never fail");
    assert_eq!(public.data.map(|record| record.id), Some("1".to_string()));
}

#[tokio::test]
async fn empty_live_listing_falls_back_by_default() {
    let h = harness(Vec::new());

    let resolved = h
        .services
        .content
        .get_published_records(ContentQuery::default())
        .await;
    assert_eq!(resolved.data.len(), 6);
    assert_eq!(resolved.count, Some(6));

    let tags = h.services.content.list_tags().await;
    assert!(tags.data.contains(&"go".to_string()));
}

#[tokio::test]
async fn authoritative_backend_keeps_empty_answers() {
    let h = harness_with(
        Vec::new(),
        folio::application::services::ServiceSettings {
            fallback_policy: FallbackPolicy::DynamicIsAuthoritative,
            ..settings()
        },
    );

    let resolved = h
        .services
        .content
        .get_published_records(ContentQuery::default())
        .await;
    assert!(resolved.data.is_empty());
    assert_eq!(resolved.count, Some(0));

    let missing = h
        .services
        .content
        .get_record_by_slug("hello-world", false)
        .await
        .expect("public reads never fail");
    assert_eq!(missing.data, None);
}

#[tokio::test]
async fn backend_errors_fall_back_silently() {
    let h = harness(vec![record("100", "live-only", &["go"], true)]);
    assert!(h.services.probe.check_availability().await);

    h.backend
        .fail_with(Some(RepoError::backend("relation does not exist", Some("42P01".into()))));
    let resolved = h
        .services
        .content
        .get_published_records(tagged(&["go"]))
        .await;

    assert_eq!(resolved.data.len(), 3);
    assert_eq!(resolved.error, None);
    let info = h.services.content.get_data_source_info().await;
    assert_eq!(info.data_source, DataSource::Static);
}

#[tokio::test(start_paused = true)]
async fn slow_backend_counts_as_unavailable() {
    let h = harness(vec![record("100", "live-only", &["go"], true)]);
    h.backend.set_latency(Some(Duration::from_secs(10)));

    let resolved = h
        .services
        .content
        .get_published_records(tagged(&["go"]))
        .await;

    assert_eq!(resolved.data.len(), 3);
    assert!(!h.services.probe.check_availability().await);
}

#[tokio::test(start_paused = true)]
async fn probe_flip_moves_expired_keys_to_snapshot() {
    let h = harness(vec![record("100", "live-only", &["go"], true)]);

    let live = h
        .services
        .content
        .get_published_records(tagged(&["go"]))
        .await;
    assert_eq!(slugs(&live.data), vec!["live-only"]);

    h.backend.set_online(false);
    // Past the probe TTL, the list TTL and the stale retention window.
    tokio::time::advance(Duration::from_secs(601)).await;

    let fallback = h
        .services
        .content
        .get_published_records(tagged(&["go"]))
        .await;
    assert_eq!(fallback.data.len(), 3);
    assert_eq!(fallback.error, None);

    let info = h.services.content.get_data_source_info().await;
    assert!(!info.is_dynamic_available);
    assert_eq!(info.data_source, DataSource::Static);
}

#[tokio::test]
async fn comments_have_no_static_fallback() {
    let h = harness(Vec::new());
    h.backend.set_online(false);

    let resolved = h.services.comments.approved_comments("1").await;
    assert!(resolved.data.is_empty());
    assert_eq!(resolved.count, Some(0));
    assert!(resolved.error.is_some());
}

#[tokio::test(start_paused = true)]
async fn source_info_follows_the_verdict_while_cached_entries_are_fresh() {
    let h = harness(vec![record("100", "live-only", &["go"], true)]);

    h.services
        .content
        .get_published_records(tagged(&["go"]))
        .await;
    assert_eq!(
        h.services.content.get_data_source_info().await.data_source,
        DataSource::Dynamic
    );

    h.backend.set_online(false);
    // Past the probe TTL only; the listing is still fresh in the cache.
    tokio::time::advance(Duration::from_secs(31)).await;

    let cached = h
        .services
        .content
        .get_published_records(tagged(&["go"]))
        .await;
    assert_eq!(slugs(&cached.data), vec!["live-only"]);

    let info = h.services.content.get_data_source_info().await;
    assert!(!info.is_dynamic_available);
    assert_eq!(info.data_source, DataSource::Static);
}

#[tokio::test]
async fn comment_fallback_does_not_change_content_source() {
    let h = harness(vec![record("100", "live-only", &["go"], true)]);
    h.services
        .content
        .get_published_records(tagged(&["go"]))
        .await;

    h.backend
        .fail_with(Some(RepoError::backend("comments table missing", None)));
    let comments = h.services.comments.approved_comments("100").await;
    assert!(comments.error.is_some());
    h.backend.fail_with(None);

    let info = h.services.content.get_data_source_info().await;
    assert!(info.is_dynamic_available);
    assert_eq!(info.data_source, DataSource::Dynamic);
}

#[tokio::test]
async fn page_past_the_end_of_a_live_listing_stays_live() {
    let h = harness(vec![
        record_at("1", "live-a", &["go"], true, datetime!(2025-02-01 00:00 UTC)),
        record_at("2", "live-b", &["go"], true, datetime!(2025-01-01 00:00 UTC)),
    ]);
    let page = |offset| ContentQuery {
        limit: Some(2),
        offset,
        ..tagged(&["go"])
    };

    let first = h.services.content.get_published_records(page(0)).await;
    assert_eq!(slugs(&first.data), vec!["live-a", "live-b"]);
    assert_eq!(first.count, Some(2));

    let second = h.services.content.get_published_records(page(2)).await;
    assert!(second.data.is_empty());
    assert_eq!(second.count, Some(2));
    assert_eq!(second.error, None);
    assert_eq!(
        h.services.content.get_data_source_info().await.data_source,
        DataSource::Dynamic
    );
}
