use crate::stats::types::{BatchSummary, ConditionSummary, Protocol, TrialResult};
use std::time::Duration;

/// Arithmetic mean of the samples. An infinite sample makes the mean infinite.
pub fn mean_latency<I>(samples: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let (sum, count) = samples
        .into_iter()
        .fold((0.0_f64, 0usize), |(sum, count), s| (sum + s, count + 1));

    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

pub fn mean_for(results: &[TrialResult], protocol: Protocol) -> Option<f64> {
    mean_latency(
        results
            .iter()
            .filter(|r| r.protocol == protocol)
            .map(|r| r.latency_secs),
    )
}

fn timeouts_for(results: &[TrialResult], protocol: Protocol) -> usize {
    results
        .iter()
        .filter(|r| r.protocol == protocol && r.is_timeout())
        .count()
}

impl ConditionSummary {
    /// Summarize every sample collected under one network condition.
    ///
    /// A protocol with no samples reports an infinite mean rather than zero.
    pub fn from_results(
        loss_percent: f32,
        delay: Duration,
        trials: u32,
        results: &[TrialResult],
    ) -> Self {
        Self {
            loss_percent,
            delay_ms: delay.as_millis() as u64,
            trials,
            mean_latency_multiplexed: mean_for(results, Protocol::Multiplexed)
                .unwrap_or(f64::INFINITY),
            mean_latency_baseline: mean_for(results, Protocol::Baseline).unwrap_or(f64::INFINITY),
            timeouts_multiplexed: timeouts_for(results, Protocol::Multiplexed),
            timeouts_baseline: timeouts_for(results, Protocol::Baseline),
        }
    }
}

impl BatchSummary {
    pub fn from_results(
        protocol: Protocol,
        results: &[TrialResult],
        elapsed: Duration,
        connections: usize,
    ) -> Self {
        Self {
            protocol,
            requests: results.len(),
            completed: results.iter().filter(|r| !r.is_timeout()).count(),
            total_bytes: results.iter().map(|r| r.bytes).sum(),
            elapsed_secs: elapsed.as_secs_f64(),
            connections,
        }
    }
}
