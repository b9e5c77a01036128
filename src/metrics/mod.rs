//! Metrics and observability
//!
//! Request latency histograms, timeout and migration counters, and the
//! injected network condition, exportable to Prometheus.

pub mod exporter;
pub mod recorder;

pub use exporter::{render_metrics, start_metrics_server, MetricsError};
pub use recorder::{
    init_metrics, record_migration, record_trial, record_trials, record_unknown_stream,
    set_network_condition,
};
