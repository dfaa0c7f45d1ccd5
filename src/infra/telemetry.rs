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
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(std::io::stderr)
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

/// Register descriptions for every page cache metric with the installed recorder.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "pagecache_hit_total",
            Unit::Count,
            "Requests answered from the page cache without rendering."
        );
        describe_counter!(
            "pagecache_miss_total",
            Unit::Count,
            "Eligible requests that had to render the page."
        );
        describe_counter!(
            "pagecache_bypass_total",
            Unit::Count,
            "Requests rendered without consulting the cache, by reason."
        );
        describe_counter!(
            "pagecache_store_error_total",
            Unit::Count,
            "Cache store failures, by operation."
        );
        describe_counter!(
            "pagecache_invalidated_keys_total",
            Unit::Count,
            "Cache keys deleted by invalidation."
        );
        describe_counter!(
            "pagecache_clear_total",
            Unit::Count,
            "Full cache clears."
        );
        describe_histogram!(
            "pagecache_invalidate_ms",
            Unit::Milliseconds,
            "Invalidation latency per event in milliseconds."
        );
    });
}
