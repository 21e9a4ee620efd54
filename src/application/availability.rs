//! Availability probe for the dynamic backend.
//!
//! Answers "is the live backend reachable and returning usable data" with a
//! memoized verdict. A miss issues the cheapest real read (one published
//! record); any failure, including a timeout or an undecodable response,
//! counts as unavailable. Zero records is still available.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use metrics::counter;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::application::repos::{ContentQuery, ContentReadRepo};
use crate::cache::lock::{rw_read, rw_write};

const SOURCE: &str = "application::availability";
pub(crate) const METRIC_PROBE_CHECK: &str = "folio_probe_check_total";

pub const DEFAULT_PROBE_TTL: Duration = Duration::from_secs(30);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityVerdict {
    pub is_available: bool,
    pub checked_at: Instant,
}

pub struct AvailabilityProbe {
    backend: Arc<dyn ContentReadRepo>,
    ttl: Duration,
    timeout: Duration,
    /// Held across the network check so concurrent callers share one probe.
    verdict: Mutex<Option<AvailabilityVerdict>>,
    /// Last verdict, readable without waiting on an in-flight check.
    latest: RwLock<Option<AvailabilityVerdict>>,
}

impl AvailabilityProbe {
    pub fn new(backend: Arc<dyn ContentReadRepo>, ttl: Duration, timeout: Duration) -> Self {
        Self {
            backend,
            ttl,
            timeout,
            verdict: Mutex::new(None),
            latest: RwLock::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Memoized availability. Never fails.
    #[instrument(skip(self))]
    pub async fn check_availability(&self) -> bool {
        let mut verdict = self.verdict.lock().await;
        if let Some(current) = verdict.as_ref()
            && current.checked_at.elapsed() < self.ttl
        {
            return current.is_available;
        }

        let previous = verdict.as_ref().map(|v| v.is_available);
        let is_available = self.probe_backend().await;
        counter!(
            METRIC_PROBE_CHECK,
            "result" => if is_available { "available" } else { "unavailable" }
        )
        .increment(1);

        match (previous, is_available) {
            (Some(true), false) => {
                warn!("Dynamic backend became unavailable; serving static snapshot")
            }
            (Some(false), true) => info!("Dynamic backend is reachable again"),
            (None, false) => warn!("Dynamic backend unavailable on first check"),
            _ => {}
        }

        let fresh = AvailabilityVerdict {
            is_available,
            checked_at: Instant::now(),
        };
        *verdict = Some(fresh);
        *rw_write(&self.latest, SOURCE, "check_availability") = Some(fresh);
        is_available
    }

    /// Drop the memoized verdict so the next check hits the network.
    pub async fn invalidate(&self) {
        *self.verdict.lock().await = None;
        *rw_write(&self.latest, SOURCE, "invalidate") = None;
        debug!("Availability verdict invalidated");
    }

    /// The memoized verdict, if any, without probing.
    pub fn last_verdict(&self) -> Option<AvailabilityVerdict> {
        *rw_read(&self.latest, SOURCE, "last_verdict")
    }

    async fn probe_backend(&self) -> bool {
        let query = ContentQuery {
            limit: Some(1),
            ..Default::default()
        };
        match tokio::time::timeout(self.timeout, self.backend.list_published(&query)).await {
            Ok(Ok(_)) => true,
            Ok(Err(err)) => {
                debug!(error = %err, "Availability probe failed");
                false
            }
            Err(_) => {
                debug!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Availability probe timed out"
                );
                false
            }
        }
    }
}
