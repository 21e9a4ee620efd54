use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .with_writer(std::io::stderr)
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .with_writer(std::io::stderr)
            .compact()
            .with_target(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "folio_cache_hit_total",
            Unit::Count,
            "Query cache lookups answered with a fresh entry."
        );
        describe_counter!(
            "folio_cache_stale_total",
            Unit::Count,
            "Query cache lookups answered with a stale entry while a refresh runs."
        );
        describe_counter!(
            "folio_cache_miss_total",
            Unit::Count,
            "Query cache lookups that had to fetch."
        );
        describe_counter!(
            "folio_cache_evict_total",
            Unit::Count,
            "Query cache entries evicted due to capacity."
        );
        describe_histogram!(
            "folio_cache_invalidate_ms",
            Unit::Milliseconds,
            "Latency of applying an invalidation plan."
        );
        describe_counter!(
            "folio_probe_check_total",
            Unit::Count,
            "Availability probes issued against the dynamic backend, by result."
        );
        describe_counter!(
            "folio_resolve_fallback_total",
            Unit::Count,
            "Reads answered from the static snapshot, by operation and reason."
        );
        describe_counter!(
            "folio_mutation_total",
            Unit::Count,
            "Coordinated writes, by operation and outcome."
        );
    });
}
