use crate::transport::StreamId;
use std::time::{Duration, Instant};

/// Book-keeping for one logical request riding on a stream.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub logical_path: String,
    pub stream_id: StreamId,
    pub start_time: Instant,
    pub bytes_received: u64,
    pub completed: bool,
    pub status: Option<u16>,
    pub completed_at: Option<Instant>,
    /// Closed by a transport failure rather than a stream end.
    pub failed: bool,
}

impl RequestDescriptor {
    pub fn new(stream_id: StreamId, logical_path: String) -> Self {
        Self {
            logical_path,
            stream_id,
            start_time: Instant::now(),
            bytes_received: 0,
            completed: false,
            status: None,
            completed_at: None,
            failed: false,
        }
    }

    /// Time from registration to stream end, if the exchange finished cleanly.
    pub fn latency(&self) -> Option<Duration> {
        if self.failed {
            return None;
        }
        self.completed_at.map(|t| t.duration_since(self.start_time))
    }
}

/// What a data event did to its descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOutcome {
    Progress { bytes_received: u64 },
    Completed { bytes_received: u64, latency: Duration },
    /// The stream had already finished; the event was dropped.
    Ignored,
}

impl DataOutcome {
    pub fn bytes_received(&self) -> Option<u64> {
        match self {
            DataOutcome::Progress { bytes_received }
            | DataOutcome::Completed { bytes_received, .. } => Some(*bytes_received),
            DataOutcome::Ignored => None,
        }
    }
}
