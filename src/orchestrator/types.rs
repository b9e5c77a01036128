use crate::dispatcher::MigrationOutcome;
use crate::fault::NetworkCondition;
use crate::stats::{BatchSummary, ConditionSummary, TrialResult};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub conditions: Vec<NetworkCondition>,
    /// Paired multiplexed/baseline rounds per condition.
    pub trials: u32,
    pub paths: Vec<String>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            conditions: NetworkCondition::sweep(&[0.0, 1.0, 5.0, 10.0], Duration::from_millis(50))
                .unwrap_or_default(),
            trials: 5,
            paths: vec!["/index.html".to_string()],
        }
    }
}

/// Everything measured under one network condition.
#[derive(Debug, Clone, Serialize)]
pub struct ConditionRun {
    pub condition: NetworkCondition,
    pub summary: ConditionSummary,
    pub results: Vec<TrialResult>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub runs: Vec<ConditionRun>,
}

impl SweepReport {
    pub fn summaries(&self) -> Vec<ConditionSummary> {
        self.runs.iter().map(|run| run.summary.clone()).collect()
    }

    pub fn results(&self) -> impl Iterator<Item = &TrialResult> {
        self.runs.iter().flat_map(|run| run.results.iter())
    }
}

/// One batch per protocol, issued back to back.
#[derive(Debug, Clone, Serialize)]
pub struct StressReport {
    pub multiplexed: BatchSummary,
    pub baseline: BatchSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub multiplexed: MigrationOutcome,
    pub baseline: MigrationOutcome,
}
