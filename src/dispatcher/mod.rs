mod dispatcher;
mod error;
mod session;
mod types;

pub use dispatcher::RequestDispatcher;
pub use error::{DispatchError, DispatchResult};
pub use session::ConnectionSession;
pub use types::{DispatchConfig, MigrationOutcome, SessionResults};
