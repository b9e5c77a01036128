//! Loss/delay injection on the benchmark path via `tc netem`.

mod controller;
mod error;
mod types;

pub use controller::{clear_args, netem_args, FaultExecutor, NetworkFaultController, TcNetem};
pub use error::{FaultError, FaultResult};
pub use types::NetworkCondition;
