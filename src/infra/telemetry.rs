use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing::Subscriber;
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter,
    filter::Directive,
    fmt,
    layer::{Layer, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// sqlx logs every statement at `info`.
const QUIET_DIRECTIVES: [&str; 1] = ["sqlx=warn"];

/// Install the global tracing subscriber and register metric descriptions.
///
/// `RUST_LOG` directives are layered over `logging.level`; sqlx stays at `warn`.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    tracing_subscriber::registry()
        .with(env_filter(logging)?)
        .with(ErrorLayer::default())
        .with(fmt_layer(logging.format))
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn env_filter(logging: &LoggingSettings) -> Result<EnvFilter, InfraError> {
    let mut filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();
    for directive in QUIET_DIRECTIVES {
        let directive = directive
            .parse::<Directive>()
            .map_err(|err| InfraError::telemetry(format!("invalid directive `{directive}`: {err}")))?;
        filter = filter.add_directive(directive);
    }
    Ok(filter)
}

fn fmt_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'span> LookupSpan<'span> + 'static,
{
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    }
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "sponsorship_eligible_cache_hit_total",
            Unit::Count,
            "Eligible lists served from cache, by slot."
        );
        describe_counter!(
            "sponsorship_eligible_cache_miss_total",
            Unit::Count,
            "Eligible list lookups that found no fresh cache entry, by slot."
        );
        describe_counter!(
            "sponsorship_eligible_cache_evict_total",
            Unit::Count,
            "Eligible lists evicted from the in-process store due to capacity."
        );
        describe_gauge!(
            "sponsorship_eligible_cache_entries",
            Unit::Count,
            "Current number of eligible lists held in the in-process store."
        );
        describe_counter!(
            "sponsorship_eligible_recompute_total",
            Unit::Count,
            "Eligible list recomputations, by slot."
        );
        describe_counter!(
            "sponsorship_eligible_query_error_total",
            Unit::Count,
            "Eligibility queries that failed and served an empty list, by slot."
        );
        describe_histogram!(
            "sponsorship_eligible_query_ms",
            Unit::Milliseconds,
            "Eligibility query latency in milliseconds."
        );
        describe_counter!(
            "sponsorship_pixel_render_total",
            Unit::Count,
            "Tracking pixel scripts emitted."
        );
        describe_counter!(
            "sponsorship_slot_api_failure_total",
            Unit::Count,
            "Slot content requests answered with an error envelope, by code."
        );
    });
}
