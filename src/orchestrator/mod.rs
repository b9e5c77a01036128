//! Comparative trial runs, condition sweeps and the trial ledger.
mod error;
mod orchestrator;
mod types;

pub use error::{BenchError, BenchResult};
pub use orchestrator::BenchmarkOrchestrator;
pub use types::{ConditionRun, MigrationReport, StressReport, SweepConfig, SweepReport};
