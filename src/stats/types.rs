use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// Which side of the comparison produced a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Protocol {
    /// Many streams over one QUIC connection.
    Multiplexed,
    /// One HTTP/1.1 connection per request.
    Baseline,
}

impl Protocol {
    pub fn label(&self) -> &'static str {
        match self {
            Protocol::Multiplexed => "QUIC",
            Protocol::Baseline => "TCP",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Serializes latency as seconds, with `null` standing in for the timeout sentinel.
pub(crate) fn serialize_latency<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_some(value)
    } else {
        serializer.serialize_none()
    }
}

/// One measured request. `latency_secs` is `f64::INFINITY` when the request
/// did not finish within its bound; `bytes` is then whatever had arrived.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialResult {
    pub protocol: Protocol,
    pub trial_index: u32,
    pub path: String,
    #[serde(rename = "latency_s", serialize_with = "serialize_latency")]
    pub latency_secs: f64,
    pub bytes: u64,
    pub status: Option<u16>,
}

impl TrialResult {
    pub fn completed(
        protocol: Protocol,
        trial_index: u32,
        path: impl Into<String>,
        latency: Duration,
        bytes: u64,
        status: Option<u16>,
    ) -> Self {
        Self {
            protocol,
            trial_index,
            path: path.into(),
            latency_secs: latency.as_secs_f64(),
            bytes,
            status,
        }
    }

    pub fn timed_out(
        protocol: Protocol,
        trial_index: u32,
        path: impl Into<String>,
        bytes: u64,
        status: Option<u16>,
    ) -> Self {
        Self {
            protocol,
            trial_index,
            path: path.into(),
            latency_secs: f64::INFINITY,
            bytes,
            status,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.latency_secs.is_infinite()
    }

    pub fn latency(&self) -> Option<Duration> {
        if self.is_timeout() {
            None
        } else {
            Some(Duration::from_secs_f64(self.latency_secs))
        }
    }
}

/// Per-condition aggregate: arithmetic mean latency for each protocol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionSummary {
    pub loss_percent: f32,
    pub delay_ms: u64,
    pub trials: u32,
    #[serde(serialize_with = "serialize_latency")]
    pub mean_latency_multiplexed: f64,
    #[serde(serialize_with = "serialize_latency")]
    pub mean_latency_baseline: f64,
    pub timeouts_multiplexed: usize,
    pub timeouts_baseline: usize,
}

/// Totals for one batch of requests issued back to back (stress mode).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub protocol: Protocol,
    pub requests: usize,
    pub completed: usize,
    pub total_bytes: u64,
    pub elapsed_secs: f64,
    pub connections: usize,
}
