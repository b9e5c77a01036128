use crate::stats::{Protocol, TrialResult};
use std::time::Duration;

/// Outcome of one single-stream request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaselineFetch {
    pub status: Option<u16>,
    pub bytes: u64,
    /// `None` when the request did not finish within its bound.
    pub elapsed: Option<Duration>,
    /// Byte count at which the connection was torn down on purpose.
    pub disrupted_at: Option<u64>,
    pub reconnects: u32,
}

impl BaselineFetch {
    pub fn into_trial(self, trial_index: u32, path: &str) -> TrialResult {
        match self.elapsed {
            Some(elapsed) => TrialResult::completed(
                Protocol::Baseline,
                trial_index,
                path,
                elapsed,
                self.bytes,
                self.status,
            ),
            None => {
                TrialResult::timed_out(Protocol::Baseline, trial_index, path, self.bytes, self.status)
            }
        }
    }
}
