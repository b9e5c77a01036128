pub mod aggregate;
pub mod types;

pub use aggregate::{mean_for, mean_latency};
pub use types::{BatchSummary, ConditionSummary, Protocol, TrialResult};
