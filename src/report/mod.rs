mod csv;
mod error;
mod report;

pub use csv::{conditions_csv, format_latency, trials_csv, CONDITIONS_HEADER, TRIALS_HEADER};
pub use error::{ReportError, ReportResult};
pub use report::{BenchReport, ReportPaths, RunMode, CONDITIONS_FILE, JSON_FILE, TRIALS_FILE};
