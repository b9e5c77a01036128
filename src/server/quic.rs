use crate::server::content::ContentRoot;
use crate::server::error::ServerResult;
use crate::transport::{header_value, wire, HeaderList, QuicTransport, TransportError};
use quinn::{Connection, RecvStream, SendStream};
use std::sync::Arc;

/// Accept connections until the endpoint closes, serving every stream on
/// every connection concurrently.
pub async fn serve_quic(transport: Arc<QuicTransport>, content: Arc<ContentRoot>) -> ServerResult<()> {
    loop {
        let conn = match transport.accept().await {
            Ok(conn) => conn,
            Err(TransportError::ConnectionClosed(reason)) => {
                tracing::info!(%reason, "QUIC endpoint closed");
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(error = %e, "incoming connection failed");
                continue;
            }
        };

        tracing::debug!(remote = %conn.remote_address(), "QUIC connection accepted");
        let transport = transport.clone();
        let content = content.clone();
        tokio::spawn(async move {
            serve_connection(&conn, content).await;
            transport.release(&conn);
        });
    }
}

async fn serve_connection(conn: &Connection, content: Arc<ContentRoot>) {
    loop {
        let (send, recv) = match conn.accept_bi().await {
            Ok(streams) => streams,
            Err(e) => {
                tracing::debug!(remote = %conn.remote_address(), reason = %e, "connection finished");
                return;
            }
        };

        let content = content.clone();
        tokio::spawn(async move {
            if let Err(e) = serve_stream(send, recv, &content).await {
                tracing::debug!(error = %e, "stream aborted");
            }
        });
    }
}

/// One request: header frame in, header frame plus body out, then FIN.
async fn serve_stream(
    mut send: SendStream,
    mut recv: RecvStream,
    content: &ContentRoot,
) -> ServerResult<()> {
    let request = wire::read_headers(&mut recv).await?;
    let path = header_value(&request, ":path").unwrap_or("/");

    match content.load(path).await? {
        Some(body) => {
            let response: HeaderList = vec![
                (":status".to_string(), "200".to_string()),
                ("content-length".to_string(), body.len().to_string()),
            ];
            wire::write_headers(&mut send, &response).await?;
            send.write_all(&body).await.map_err(TransportError::from)?;
            tracing::debug!(path, bytes = body.len(), "served");
        }
        None => {
            let response: HeaderList = vec![(":status".to_string(), "404".to_string())];
            wire::write_headers(&mut send, &response).await?;
            tracing::debug!(path, "not found");
        }
    }

    send.finish()
        .map_err(|e| TransportError::SendFailed(e.to_string()))?;
    Ok(())
}
