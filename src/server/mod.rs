//! The content server both transports talk to.
mod content;
mod error;
mod http;
mod quic;

pub use content::ContentRoot;
pub use error::{ServerError, ServerResult};
pub use http::{http_router, serve_http};
pub use quic::serve_quic;
