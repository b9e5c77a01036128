use crate::baseline::BaselineClient;
use crate::dispatcher::RequestDispatcher;
use crate::fault::{FaultExecutor, NetworkFaultController};
use crate::orchestrator::error::{BenchError, BenchResult};
use crate::orchestrator::types::{
    ConditionRun, MigrationReport, StressReport, SweepConfig, SweepReport,
};
use crate::stats::{BatchSummary, ConditionSummary, Protocol, TrialResult};
use crate::transport::MultiplexedConnector;
use std::time::Instant;

/// Runs the comparison trials and owns the trial ledger.
///
/// The network condition only changes between condition batches, never while
/// a trial is in flight.
pub struct BenchmarkOrchestrator<C, B, E> {
    dispatcher: RequestDispatcher<C, B>,
    faults: NetworkFaultController<E>,
    ledger: Vec<TrialResult>,
}

impl<C, B, E> BenchmarkOrchestrator<C, B, E>
where
    C: MultiplexedConnector,
    B: BaselineClient,
    E: FaultExecutor,
{
    pub fn new(dispatcher: RequestDispatcher<C, B>, faults: NetworkFaultController<E>) -> Self {
        Self {
            dispatcher,
            faults,
            ledger: Vec::new(),
        }
    }

    pub fn dispatcher(&self) -> &RequestDispatcher<C, B> {
        &self.dispatcher
    }

    pub fn faults(&self) -> &NetworkFaultController<E> {
        &self.faults
    }

    /// Remove any injected condition, e.g. after an interrupted sweep.
    pub async fn clear_faults(&mut self) -> BenchResult<()> {
        Ok(self.faults.clear().await?)
    }

    /// Every sample recorded so far, in the order it was taken.
    pub fn ledger(&self) -> &[TrialResult] {
        &self.ledger
    }

    /// One multiplexed batch over `paths`, then the same paths on the baseline.
    pub async fn run_trial(
        &mut self,
        paths: &[String],
        trial_index: u32,
    ) -> BenchResult<Vec<TrialResult>> {
        let mut results = self.dispatcher.run_multiplexed(paths, trial_index).await?;
        results.extend(self.dispatcher.dispatch_baseline(paths, trial_index).await?);

        for result in &results {
            tracing::info!(
                trial = trial_index,
                proto = %result.protocol,
                path = %result.path,
                latency_s = result.latency_secs,
                bytes = result.bytes,
                "sample"
            );
        }
        self.ledger.extend(results.iter().cloned());
        Ok(results)
    }

    /// Apply each condition in turn and run the trials under it. The network
    /// is cleared afterwards whether or not the sweep succeeded; a rule that
    /// cannot be removed fails an otherwise successful sweep.
    pub async fn run_sweep(&mut self, config: &SweepConfig) -> BenchResult<SweepReport> {
        validate(config.trials, &config.paths)?;
        let faults_required = config.conditions.iter().any(|c| !c.is_clear());

        let outcome = self.sweep_conditions(config, faults_required).await;

        match (self.faults.clear().await, outcome) {
            (Ok(()), outcome) => outcome,
            (Err(e), Ok(_)) => {
                tracing::error!(
                    interface = %self.faults.interface(),
                    active = %self.faults.active(),
                    error = %e,
                    "network condition left installed"
                );
                Err(e.into())
            }
            (Err(e), Err(sweep_error)) => {
                tracing::warn!(
                    interface = %self.faults.interface(),
                    error = %e,
                    "failed to clear network condition"
                );
                Err(sweep_error)
            }
        }
    }

    async fn sweep_conditions(
        &mut self,
        config: &SweepConfig,
        faults_required: bool,
    ) -> BenchResult<SweepReport> {
        let mut report = SweepReport::default();

        for condition in &config.conditions {
            tracing::info!(%condition, "testing condition");
            match self.faults.apply(*condition).await {
                Ok(()) => {}
                Err(e) if faults_required => return Err(e.into()),
                Err(e) => tracing::warn!(error = %e, "continuing without fault injection"),
            }

            let mut results = Vec::new();
            for trial_index in 1..=config.trials {
                results.extend(self.run_trial(&config.paths, trial_index).await?);
            }

            let summary = ConditionSummary::from_results(
                condition.loss_percent,
                condition.delay,
                config.trials,
                &results,
            );
            tracing::info!(
                %condition,
                quic_avg = summary.mean_latency_multiplexed,
                tcp_avg = summary.mean_latency_baseline,
                "condition done"
            );

            report.runs.push(ConditionRun {
                condition: *condition,
                summary,
                results,
            });
        }
        Ok(report)
    }

    /// The plain comparison: `trials` rounds with no fault injection.
    pub async fn run_baseline(
        &mut self,
        trials: u32,
        paths: &[String],
    ) -> BenchResult<Vec<TrialResult>> {
        validate(trials, paths)?;

        let mut results = Vec::new();
        for trial_index in 1..=trials {
            results.extend(self.run_trial(paths, trial_index).await?);
        }
        Ok(results)
    }

    /// All paths at once on one multiplexed connection, then all paths one
    /// connection at a time.
    pub async fn run_stress(&mut self, paths: &[String]) -> BenchResult<StressReport> {
        validate(1, paths)?;

        let started = Instant::now();
        let multiplexed = self.dispatcher.run_multiplexed(paths, 1).await?;
        let multiplexed_summary =
            BatchSummary::from_results(Protocol::Multiplexed, &multiplexed, started.elapsed(), 1);
        tracing::info!(
            streams = paths.len(),
            elapsed_s = multiplexed_summary.elapsed_secs,
            "multiplexed batch done"
        );

        let started = Instant::now();
        let baseline = self.dispatcher.dispatch_baseline(paths, 1).await?;
        let baseline_summary = BatchSummary::from_results(
            Protocol::Baseline,
            &baseline,
            started.elapsed(),
            paths.len(),
        );
        tracing::info!(
            requests = paths.len(),
            elapsed_s = baseline_summary.elapsed_secs,
            "baseline batch done"
        );

        self.ledger.extend(multiplexed);
        self.ledger.extend(baseline);
        Ok(StressReport {
            multiplexed: multiplexed_summary,
            baseline: baseline_summary,
        })
    }

    /// One download per protocol, disrupted mid-transfer.
    pub async fn run_migration(&mut self, path: &str) -> BenchResult<MigrationReport> {
        let multiplexed = self.dispatcher.dispatch_migration(path, 1).await?;
        let baseline = self.dispatcher.dispatch_baseline_disrupted(path, 1).await?;

        self.ledger.push(multiplexed.result.clone());
        self.ledger.push(baseline.result.clone());
        Ok(MigrationReport {
            multiplexed,
            baseline,
        })
    }
}

fn validate(trials: u32, paths: &[String]) -> BenchResult<()> {
    if trials == 0 {
        return Err(BenchError::InvalidConfig("trials must be at least 1".into()));
    }
    if paths.is_empty() {
        return Err(BenchError::InvalidConfig("no request paths".into()));
    }
    Ok(())
}
