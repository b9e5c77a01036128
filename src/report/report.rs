//! Benchmark report
//!
//! Collects the samples and summaries of one run and writes them out as CSV
//! and JSON, plus a plain-text table for the console.

use crate::orchestrator::{MigrationReport, StressReport, SweepReport};
use crate::report::csv::{conditions_csv, format_latency, trials_csv};
use crate::report::error::ReportResult;
use crate::stats::{mean_for, ConditionSummary, Protocol, TrialResult};
use serde::Serialize;
use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const TRIALS_FILE: &str = "benchmark_results.csv";
pub const CONDITIONS_FILE: &str = "loss_results.csv";
pub const JSON_FILE: &str = "report.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    Baseline,
    LossSweep,
    Stress,
    Migration,
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchReport {
    pub run_id: Uuid,
    pub generated_at: String,
    pub mode: RunMode,
    pub samples: Vec<TrialResult>,
    pub conditions: Vec<ConditionSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stress: Option<StressReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub migration: Option<MigrationReport>,
}

/// Where `save` put each file.
#[derive(Debug, Clone, Default)]
pub struct ReportPaths {
    pub trials_csv: Option<PathBuf>,
    pub conditions_csv: Option<PathBuf>,
    pub json: PathBuf,
}

impl BenchReport {
    fn new(mode: RunMode, samples: Vec<TrialResult>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            mode,
            samples,
            conditions: Vec::new(),
            stress: None,
            migration: None,
        }
    }

    pub fn from_baseline(samples: Vec<TrialResult>) -> Self {
        Self::new(RunMode::Baseline, samples)
    }

    pub fn from_sweep(sweep: &SweepReport) -> Self {
        let mut report = Self::new(RunMode::LossSweep, sweep.results().cloned().collect());
        report.conditions = sweep.summaries();
        report
    }

    pub fn from_stress(stress: StressReport, samples: Vec<TrialResult>) -> Self {
        let mut report = Self::new(RunMode::Stress, samples);
        report.stress = Some(stress);
        report
    }

    pub fn from_migration(migration: MigrationReport) -> Self {
        let samples = vec![
            migration.multiplexed.result.clone(),
            migration.baseline.result.clone(),
        ];
        let mut report = Self::new(RunMode::Migration, samples);
        report.migration = Some(migration);
        report
    }

    pub fn to_json(&self) -> ReportResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Console summary of whatever this run measured.
    pub fn summary_table(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "SUMMARY ({:?}, run {})", self.mode, self.run_id);
        let _ = writeln!(out, "---------------------------------------------");

        if !self.samples.is_empty() {
            let quic = mean_for(&self.samples, Protocol::Multiplexed).unwrap_or(f64::INFINITY);
            let tcp = mean_for(&self.samples, Protocol::Baseline).unwrap_or(f64::INFINITY);
            let _ = writeln!(
                out,
                "Avg latency: QUIC={} s | TCP={} s ({} samples)",
                format_latency(quic),
                format_latency(tcp),
                self.samples.len()
            );
        }

        if !self.conditions.is_empty() {
            let _ = writeln!(out, "\n| Loss % | Delay ms | QUIC avg s | TCP avg s |");
            let _ = writeln!(out, "|--------|----------|------------|-----------|");
            for c in &self.conditions {
                let _ = writeln!(
                    out,
                    "| {} | {} | {} | {} |",
                    c.loss_percent,
                    c.delay_ms,
                    format_latency(c.mean_latency_multiplexed),
                    format_latency(c.mean_latency_baseline)
                );
            }
        }

        if let Some(stress) = &self.stress {
            let _ = writeln!(out, "\n| Protocol | Requests | Completed | Total s | Connections |");
            let _ = writeln!(out, "|----------|----------|-----------|---------|-------------|");
            for batch in [&stress.multiplexed, &stress.baseline] {
                let _ = writeln!(
                    out,
                    "| {} | {} | {} | {:.2} | {} |",
                    batch.protocol,
                    batch.requests,
                    batch.completed,
                    batch.elapsed_secs,
                    batch.connections
                );
            }
        }

        if let Some(migration) = &self.migration {
            for outcome in [&migration.multiplexed, &migration.baseline] {
                let fired = outcome
                    .fired_at_bytes
                    .map_or_else(|| "never".to_string(), |b| format!("at {b} bytes"));
                let _ = writeln!(
                    out,
                    "{}: {} bytes in {} s, disruption {fired}, reconnects {}",
                    outcome.result.protocol,
                    outcome.result.bytes,
                    format_latency(outcome.result.latency_secs),
                    outcome.reconnects
                );
            }
        }
        out
    }

    /// Write the CSV sinks that apply to this run plus the JSON report.
    pub fn save(&self, output_dir: &Path) -> ReportResult<ReportPaths> {
        fs::create_dir_all(output_dir)?;
        let mut paths = ReportPaths::default();

        if !self.samples.is_empty() {
            let path = output_dir.join(TRIALS_FILE);
            fs::write(&path, trials_csv(&self.samples))?;
            paths.trials_csv = Some(path);
        }

        if !self.conditions.is_empty() {
            let path = output_dir.join(CONDITIONS_FILE);
            fs::write(&path, conditions_csv(&self.conditions))?;
            paths.conditions_csv = Some(path);
        }

        paths.json = output_dir.join(JSON_FILE);
        fs::write(&paths.json, self.to_json()?)?;

        tracing::info!(dir = %output_dir.display(), "report saved");
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::NetworkCondition;
    use crate::orchestrator::ConditionRun;
    use std::time::Duration;

    fn sample(protocol: Protocol, latency_ms: Option<u64>) -> TrialResult {
        match latency_ms {
            Some(ms) => TrialResult::completed(
                protocol,
                1,
                "/index.html",
                Duration::from_millis(ms),
                100,
                Some(200),
            ),
            None => TrialResult::timed_out(protocol, 1, "/index.html", 0, None),
        }
    }

    #[test]
    fn test_sentinel_serializes_as_null() {
        let report = BenchReport::from_baseline(vec![sample(Protocol::Baseline, None)]);
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

        assert_eq!(json["mode"], "baseline");
        assert!(json["samples"][0]["latency_s"].is_null());
        assert!(json.get("stress").is_none());
    }

    #[test]
    fn test_save_sweep_writes_both_csvs() {
        let results = vec![
            sample(Protocol::Multiplexed, Some(10)),
            sample(Protocol::Baseline, Some(30)),
        ];
        let condition = NetworkCondition::new(1.0, Duration::from_millis(50)).unwrap();
        let sweep = SweepReport {
            runs: vec![ConditionRun {
                condition,
                summary: ConditionSummary::from_results(1.0, condition.delay, 1, &results),
                results,
            }],
        };

        let dir = tempfile::tempdir().unwrap();
        let report = BenchReport::from_sweep(&sweep);
        let paths = report.save(dir.path()).unwrap();

        let trials = fs::read_to_string(paths.trials_csv.unwrap()).unwrap();
        assert_eq!(trials.lines().count(), 3);

        let conditions = fs::read_to_string(paths.conditions_csv.unwrap()).unwrap();
        assert_eq!(
            conditions.lines().nth(1).unwrap(),
            "1,50,0.010000,0.030000"
        );
        assert!(paths.json.exists());
        assert!(report.summary_table().contains("| 1 | 50 |"));
    }

    #[test]
    fn test_baseline_run_skips_loss_csv() {
        let dir = tempfile::tempdir().unwrap();
        let report = BenchReport::from_baseline(vec![sample(Protocol::Multiplexed, Some(5))]);
        let paths = report.save(dir.path()).unwrap();

        assert!(paths.conditions_csv.is_none());
        assert!(!dir.path().join(CONDITIONS_FILE).exists());
    }
}
