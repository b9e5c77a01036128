use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

/// Opaque stream handle allocated by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamId(pub u64);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ordered list of `(name, value)` header pairs, pseudo-headers included.
pub type HeaderList = Vec<(String, String)>;

/// Events delivered by a multiplexed connection, in arrival order.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    HeadersReceived {
        stream_id: StreamId,
        headers: HeaderList,
    },
    DataReceived {
        stream_id: StreamId,
        data: Bytes,
        stream_ended: bool,
    },
    /// The stream failed before its end was observed.
    StreamReset { stream_id: StreamId, reason: String },
}

impl TransportEvent {
    pub fn stream_id(&self) -> StreamId {
        match self {
            TransportEvent::HeadersReceived { stream_id, .. }
            | TransportEvent::DataReceived { stream_id, .. }
            | TransportEvent::StreamReset { stream_id, .. } => *stream_id,
        }
    }
}

/// Builds the header list for a `GET` of `path`.
pub fn request_headers(authority: &str, path: &str) -> HeaderList {
    vec![
        (":method".to_string(), "GET".to_string()),
        (":scheme".to_string(), "https".to_string()),
        (":authority".to_string(), authority.to_string()),
        (":path".to_string(), path.to_string()),
    ]
}

/// Looks up a header value by name.
pub fn header_value<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Parses the `:status` pseudo-header.
pub fn status_of(headers: &[(String, String)]) -> Option<u16> {
    header_value(headers, ":status").and_then(|v| v.parse().ok())
}

#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub bind_addr: SocketAddr,
    pub remote_addr: SocketAddr,
    pub server_name: String,
    pub max_idle_timeout: Duration,
    pub keep_alive_interval: Duration,
    pub max_concurrent_streams: u32,
    /// Skip certificate verification; the bundled server uses a self-signed cert.
    pub insecure_skip_verify: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 0)),
            remote_addr: SocketAddr::from(([127, 0, 0, 1], 4433)),
            server_name: "localhost".to_string(),
            max_idle_timeout: Duration::from_secs(60),
            keep_alive_interval: Duration::from_secs(5),
            max_concurrent_streams: 256,
            insecure_skip_verify: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransportStats {
    pub connections_opened: u64,
    pub streams_opened: u64,
    pub bytes_received: u64,
    pub path_changes: u64,
}
