//! Prometheus metrics for receipts-service.

use once_cell::sync::Lazy;
use prometheus::{register_counter_vec, register_histogram_vec, CounterVec, HistogramVec};

/// Receipt mutation counter by operation and outcome.
pub static RECEIPT_MUTATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "receipts_mutations_total",
        "Total number of receipt mutations",
        &["operation", "status"] // create/update/cancel, ok/error
    )
    .expect("Failed to register receipts_mutations_total")
});

/// Error counter for alerting.
pub static ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "receipts_errors_total",
        "Total number of errors by type",
        &["error_type"] // bad_request, conflict, db_error, ...
    )
    .expect("Failed to register receipts_errors_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "receipts_db_query_duration_seconds",
        "Database query duration in seconds",
        &["query"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("Failed to register db_query_duration")
});
