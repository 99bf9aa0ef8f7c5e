use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
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
            "vigil_sync_entries_sent_total",
            Unit::Count,
            "Outbox entries acknowledged by the remote."
        );
        describe_counter!(
            "vigil_sync_entries_failed_total",
            Unit::Count,
            "Outbox deliveries that failed and stay queued."
        );
        describe_counter!(
            "vigil_sync_conflicts_total",
            Unit::Count,
            "Stale-state rejections handled by the conflict policy."
        );
        describe_histogram!(
            "vigil_sync_flush_ms",
            Unit::Milliseconds,
            "Outbox flush duration in milliseconds."
        );
        describe_gauge!(
            "vigil_sync_queue_len",
            Unit::Count,
            "Entries currently waiting in the outbox."
        );
        describe_counter!(
            "vigil_inspection_transitions_total",
            Unit::Count,
            "Inspection lifecycle transitions committed locally."
        );
    });
}
