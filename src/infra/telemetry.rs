use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::cache;
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
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
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
            cache::METRIC_QUERY_CACHE_HIT,
            Unit::Count,
            "Cached queries answered from the key-value store."
        );
        describe_counter!(
            cache::METRIC_QUERY_CACHE_MISS,
            Unit::Count,
            "Cached queries that fell through to the document store."
        );
        describe_counter!(
            cache::METRIC_QUERY_CACHE_BYPASS,
            Unit::Count,
            "Queries executed without consulting the cache."
        );
        describe_counter!(
            cache::METRIC_QUERY_CACHE_CORRUPT,
            Unit::Count,
            "Cache entries that could not be decoded and were treated as misses."
        );
        describe_counter!(
            cache::METRIC_KV_ERROR,
            Unit::Count,
            "Key-value store operations that failed."
        );
        describe_counter!(
            cache::METRIC_INVALIDATION,
            Unit::Count,
            "Cache groups cleared after a write."
        );
        describe_counter!(
            cache::METRIC_INVALIDATION_ERROR,
            Unit::Count,
            "Cache group clears that failed."
        );
    });
}
