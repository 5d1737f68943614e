use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing::Subscriber;
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Counters emitted by the gateway, cache and request layer.
pub const COUNTERS: [(&str, &str); 6] = [
    ("blobgate_cache_hit_total", "Reads answered from the cache."),
    (
        "blobgate_cache_miss_total",
        "Reads that fell through to the object store.",
    ),
    (
        "blobgate_cache_evict_total",
        "Cache slots dropped to stay within capacity.",
    ),
    (
        "blobgate_cache_populate_failed_total",
        "Background cache populations that returned an error.",
    ),
    (
        "blobgate_store_read_total",
        "Object store reads issued by the read path.",
    ),
    (
        "blobgate_auth_rejected_total",
        "PUT and DELETE requests refused by the credential check.",
    ),
];

/// Install a global tracing subscriber using the provided logging settings.
///
/// Request spans carry `request_id`, `method` and `key`; the JSON format
/// prints them on every event so a key's history can be grepped.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    tracing_subscriber::registry()
        .with(env_filter(logging))
        .with(ErrorLayer::default())
        .with(fmt_layer(logging.format))
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn env_filter(logging: &LoggingSettings) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy()
}

fn fmt_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'span> LookupSpan<'span> + 'static,
{
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    }
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        for (name, help) in COUNTERS {
            describe_counter!(name, Unit::Count, help);
        }
    });
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use tracing_subscriber::Registry;

    use super::*;

    #[test]
    fn counter_names_are_unique_and_namespaced() {
        let names: HashSet<_> = COUNTERS.iter().map(|(name, _)| *name).collect();
        assert_eq!(names.len(), COUNTERS.len());
        assert!(
            names
                .iter()
                .all(|name| name.starts_with("blobgate_") && name.ends_with("_total"))
        );
    }

    #[test]
    fn both_formats_build_a_layer() {
        for format in [LogFormat::Json, LogFormat::Compact] {
            let _subscriber = Registry::default().with(fmt_layer(format));
        }
    }
}
