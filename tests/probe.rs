mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{harness, record};
use folio::application::availability::AvailabilityProbe;
use folio::application::repos::RepoError;
use folio::infra::backend::{InMemoryBackend, OfflineBackend};

fn probe_over(backend: Arc<InMemoryBackend>) -> AvailabilityProbe {
    AvailabilityProbe::new(backend, Duration::from_secs(30), Duration::from_secs(1))
}

#[tokio::test(start_paused = true)]
async fn checks_within_ttl_hit_the_backend_once() {
    let backend = Arc::new(InMemoryBackend::new());
    let probe = probe_over(backend.clone());

    for _ in 0..5 {
        assert!(probe.check_availability().await);
        tokio::time::advance(Duration::from_secs(5)).await;
    }
    assert_eq!(backend.call_count(), 1);
}

#[tokio::test]
async fn concurrent_checks_share_one_probe() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.set_latency(Some(Duration::from_millis(20)));
    let probe = Arc::new(probe_over(backend.clone()));

    let checks = (0..8).map(|_| {
        let probe = probe.clone();
        tokio::spawn(async move { probe.check_availability().await })
    });
    for check in checks {
        assert!(check.await.expect("task completes"));
    }
    assert_eq!(backend.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn expired_verdict_is_rechecked() {
    let backend = Arc::new(InMemoryBackend::new());
    let probe = probe_over(backend.clone());

    assert!(probe.check_availability().await);
    backend.set_online(false);
    assert!(probe.check_availability().await, "memoized until ttl");

    tokio::time::advance(Duration::from_secs(31)).await;
    assert!(!probe.check_availability().await);
    assert_eq!(backend.call_count(), 2);
}

#[tokio::test]
async fn invalidate_forces_a_fresh_check() {
    let backend = Arc::new(InMemoryBackend::new());
    let probe = probe_over(backend.clone());

    assert!(probe.check_availability().await);
    assert!(probe.last_verdict().is_some());

    backend.set_online(false);
    probe.invalidate().await;
    assert!(probe.last_verdict().is_none());
    assert!(!probe.check_availability().await);

    let verdict = probe.last_verdict().expect("verdict recorded");
    assert!(!verdict.is_available);
}

#[tokio::test(start_paused = true)]
async fn timeout_counts_as_unavailable() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.set_latency(Some(Duration::from_secs(5)));
    let probe = probe_over(backend);

    assert!(!probe.check_availability().await);
}

#[tokio::test]
async fn any_backend_error_counts_as_unavailable() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.fail_with(Some(RepoError::Decode("unexpected token".into())));
    let probe = probe_over(backend.clone());
    assert!(!probe.check_availability().await);

    backend.fail_with(None);
    probe.invalidate().await;
    assert!(probe.check_availability().await, "zero records is still available");
}

#[tokio::test]
async fn offline_backend_is_never_available() {
    let probe = AvailabilityProbe::new(
        Arc::new(OfflineBackend),
        Duration::from_secs(30),
        Duration::from_secs(1),
    );
    assert!(!probe.check_availability().await);
}

#[tokio::test]
async fn services_share_one_verdict_across_reads() {
    let h = harness(vec![record("1", "only", &["rust"], true)]);
    h.backend.reset_calls();

    h.services.content.get_data_source_info().await;
    h.services.content.get_data_source_info().await;
    h.services.probe.check_availability().await;
    assert_eq!(h.backend.call_count(), 1);

    h.services.content.reset_probe().await;
    h.services.probe.check_availability().await;
    assert_eq!(h.backend.call_count(), 2);
}
