use crate::transport::error::TransportResult;
use crate::transport::types::{HeaderList, StreamId, TransportEvent};
use async_trait::async_trait;
use bytes::Bytes;

/// Opens multiplexed connections to a fixed peer.
#[async_trait]
pub trait MultiplexedConnector: Send + Sync {
    type Connection: MultiplexedConnection;

    async fn open_connection(&self) -> TransportResult<Self::Connection>;
}

/// One multiplexed connection carrying many concurrent request streams.
///
/// Stream ids handed out by `open_stream` are unique for the lifetime of the
/// connection. Events for all streams arrive through `next_event` in whatever
/// order the network delivers them.
#[async_trait]
pub trait MultiplexedConnection: Send {
    async fn open_stream(&mut self) -> TransportResult<StreamId>;

    async fn send_headers(&mut self, stream_id: StreamId, headers: HeaderList)
        -> TransportResult<()>;

    async fn send_data(
        &mut self,
        stream_id: StreamId,
        data: Bytes,
        end_stream: bool,
    ) -> TransportResult<()>;

    /// Next event from any stream. `None` once the connection can deliver no more.
    async fn next_event(&mut self) -> Option<TransportEvent>;

    /// Moves the connection onto a new network path without tearing it down.
    fn change_path_identifier(&self) -> TransportResult<()>;

    fn close(&mut self);
}
