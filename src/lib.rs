//! Latency benchmark of many request streams over one QUIC connection
//! against one HTTP/1.1 connection per request, under injected loss and delay.

pub mod baseline;
pub mod config;
pub mod correlator;
pub mod dispatcher;
pub mod fault;
pub mod metrics;
pub mod migration;
pub mod orchestrator;
pub mod report;
pub mod server;
pub mod stats;
pub mod transport;
