//! Prometheus metrics for ride-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};

/// Ride transition counter by resulting status.
pub static RIDE_TRANSITIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "ride_transitions_total",
        "Total number of ride status transitions",
        &["status"]
    )
    .expect("Failed to register ride_transitions_total")
});

/// Settlement counter by payment method and outcome.
pub static SETTLEMENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "ride_settlements_total",
        "Total number of ride settlements",
        &["method", "outcome"]
    )
    .expect("Failed to register ride_settlements_total")
});

/// Webhook deliveries by reconciliation outcome.
pub static WEBHOOK_EVENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "ride_webhook_events_total",
        "Total number of gateway webhook deliveries by outcome",
        &["outcome"]
    )
    .expect("Failed to register ride_webhook_events_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "ride_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&RIDE_TRANSITIONS_TOTAL);
    Lazy::force(&SETTLEMENTS_TOTAL);
    Lazy::force(&WEBHOOK_EVENTS_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
