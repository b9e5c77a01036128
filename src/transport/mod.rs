pub mod adapter;
pub mod error;
pub mod quic_transport;
pub mod types;
pub mod wire;

pub use adapter::{MultiplexedConnection, MultiplexedConnector};
pub use error::{TransportError, TransportResult};
pub use quic_transport::{QuicConnection, QuicConnector, QuicTransport};
pub use types::{
    header_value, request_headers, status_of, ConnectionConfig, HeaderList, StreamId,
    TransportEvent, TransportStats,
};
