//! Single-stream HTTP/1.1 baseline, one TCP connection per request.
mod client;
mod error;
mod types;

pub use client::{BaselineClient, HttpBaseline};
pub use error::{BaselineError, BaselineResult};
pub use types::BaselineFetch;
