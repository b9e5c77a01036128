//! Metrics recorder for benchmark runs
//!
//! Records request samples, timeouts, migrations and the active network condition.

use crate::stats::{Protocol, TrialResult};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::sync::atomic::{AtomicBool, Ordering};

static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize metric descriptions (call once at startup)
pub fn init_metrics() {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    describe_counter!("muxbench_requests_total", "Requests measured, by protocol");
    describe_counter!(
        "muxbench_request_timeouts_total",
        "Requests that did not finish within the timeout bound"
    );
    describe_counter!(
        "muxbench_bytes_received_total",
        "Response body bytes received"
    );
    describe_counter!(
        "muxbench_migrations_total",
        "Mid-transfer disruptions fired, by outcome"
    );
    describe_counter!(
        "muxbench_unknown_stream_events_total",
        "Transport events for streams the session never registered"
    );

    describe_gauge!(
        "muxbench_fault_loss_percent",
        "Packet loss currently injected on the benchmark path"
    );
    describe_gauge!(
        "muxbench_fault_delay_ms",
        "Delay currently injected on the benchmark path"
    );

    describe_histogram!(
        "muxbench_request_latency_seconds",
        "Latency of completed requests"
    );
}

// ============== Request Samples ==============

/// Record one finished or timed out request
pub fn record_trial(result: &TrialResult) {
    let protocol = result.protocol.label();
    counter!("muxbench_requests_total", "protocol" => protocol).increment(1);
    counter!("muxbench_bytes_received_total", "protocol" => protocol).increment(result.bytes);

    match result.latency() {
        Some(latency) => {
            histogram!("muxbench_request_latency_seconds", "protocol" => protocol)
                .record(latency.as_secs_f64());
        }
        None => {
            counter!("muxbench_request_timeouts_total", "protocol" => protocol).increment(1);
        }
    }
}

pub fn record_trials(results: &[TrialResult]) {
    results.iter().for_each(record_trial);
}

pub fn record_unknown_stream(protocol: Protocol) {
    counter!("muxbench_unknown_stream_events_total", "protocol" => protocol.label()).increment(1);
}

// ============== Disruption ==============

pub fn record_migration(succeeded: bool) {
    let outcome = if succeeded { "ok" } else { "error" };
    counter!("muxbench_migrations_total", "outcome" => outcome).increment(1);
}

// ============== Network Condition ==============

pub fn set_network_condition(loss_percent: f32, delay_ms: u64) {
    gauge!("muxbench_fault_loss_percent").set(loss_percent as f64);
    gauge!("muxbench_fault_delay_ms").set(delay_ms as f64);
}
