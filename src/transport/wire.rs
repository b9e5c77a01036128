//! Per-stream framing.
//!
//! Every stream opens with a HEADERS frame: a big-endian `u32` length followed
//! by the bincode encoding of the header list. Whatever follows on the stream
//! is body bytes, and the stream FIN marks the end of the exchange.

use crate::transport::error::{TransportError, TransportResult};
use crate::transport::types::HeaderList;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on an encoded header block.
pub const MAX_HEADER_BLOCK: usize = 64 * 1024;

pub fn encode_headers(headers: &HeaderList) -> TransportResult<Vec<u8>> {
    let block = bincode::serialize(headers)?;
    if block.len() > MAX_HEADER_BLOCK {
        return Err(TransportError::Protocol(format!(
            "header block of {} bytes exceeds {}",
            block.len(),
            MAX_HEADER_BLOCK
        )));
    }

    let mut frame = Vec::with_capacity(4 + block.len());
    frame.extend_from_slice(&(block.len() as u32).to_be_bytes());
    frame.extend_from_slice(&block);
    Ok(frame)
}

pub async fn write_headers<W>(writer: &mut W, headers: &HeaderList) -> TransportResult<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_headers(headers)?;
    writer
        .write_all(&frame)
        .await
        .map_err(|e| TransportError::SendFailed(e.to_string()))
}

pub async fn read_headers<R>(reader: &mut R) -> TransportResult<HeaderList>
where
    R: AsyncRead + Unpin,
{
    let len = reader
        .read_u32()
        .await
        .map_err(|e| TransportError::ReceiveFailed(e.to_string()))? as usize;

    if len > MAX_HEADER_BLOCK {
        return Err(TransportError::Protocol(format!(
            "header block of {len} bytes exceeds {MAX_HEADER_BLOCK}"
        )));
    }

    let mut block = vec![0u8; len];
    reader
        .read_exact(&mut block)
        .await
        .map_err(|e| TransportError::ReceiveFailed(e.to_string()))?;

    Ok(bincode::deserialize(&block)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::types::{request_headers, status_of};

    #[tokio::test]
    async fn test_header_frame_followed_by_body() {
        let headers = vec![
            (":status".to_string(), "200".to_string()),
            ("content-length".to_string(), "5".to_string()),
        ];
        let mut buf = Vec::new();
        write_headers(&mut buf, &headers).await.unwrap();
        buf.extend_from_slice(b"hello");

        let mut reader = buf.as_slice();
        let decoded = read_headers(&mut reader).await.unwrap();
        assert_eq!(status_of(&decoded), Some(200));
        assert_eq!(reader, b"hello");
    }

    #[tokio::test]
    async fn test_truncated_frame_is_rejected() {
        let frame = encode_headers(&request_headers("localhost", "/index.html")).unwrap();
        let mut reader = &frame[..frame.len() - 3];
        assert!(read_headers(&mut reader).await.is_err());
    }

    #[tokio::test]
    async fn test_oversized_length_is_rejected() {
        let bytes = ((MAX_HEADER_BLOCK + 1) as u32).to_be_bytes();
        let mut reader = &bytes[..];
        match read_headers(&mut reader).await {
            Err(TransportError::Protocol(msg)) => assert!(msg.contains("exceeds")),
            other => panic!("expected protocol error, got {other:?}"),
        }
    }
}
