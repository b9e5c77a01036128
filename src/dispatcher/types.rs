use crate::migration::{MigrationTrigger, DEFAULT_MIGRATION_THRESHOLD};
use crate::stats::TrialResult;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Bound on one batch (multiplexed) or one request (baseline).
    pub timeout: Duration,
    /// Pause between tearing down a baseline connection and resuming.
    pub settle_delay: Duration,
    pub migration_threshold: u64,
    /// `:authority` sent on multiplexed requests.
    pub authority: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            settle_delay: Duration::from_secs(1),
            migration_threshold: DEFAULT_MIGRATION_THRESHOLD,
            authority: "localhost".to_string(),
        }
    }
}

/// What a multiplexed session produced once it stopped waiting.
#[derive(Debug, Clone)]
pub struct SessionResults {
    pub results: Vec<TrialResult>,
    pub trigger: Option<MigrationTrigger>,
    /// The batch deadline passed with streams still open.
    pub timed_out: bool,
}

/// A single download disrupted part way through.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationOutcome {
    pub result: TrialResult,
    pub threshold: u64,
    pub fired_at_bytes: Option<u64>,
    pub disruption_succeeded: Option<bool>,
    /// New connections opened to finish the download (baseline only).
    pub reconnects: u32,
}
