mod correlator;
mod error;
mod types;

pub use correlator::StreamCorrelator;
pub use error::{CorrelatorError, CorrelatorResult};
pub use types::{DataOutcome, RequestDescriptor};
