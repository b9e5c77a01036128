use crate::transport::adapter::{MultiplexedConnection, MultiplexedConnector};
use crate::transport::error::{TransportError, TransportResult};
use crate::transport::types::{ConnectionConfig, HeaderList, StreamId, TransportEvent, TransportStats};
use crate::transport::wire;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::RwLock;
use quinn::{Connection, Endpoint, RecvStream, SendStream, ServerConfig};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Largest chunk handed to the event stream per read.
const READ_CHUNK: usize = 64 * 1024;

fn transport_config(config: &ConnectionConfig) -> TransportResult<quinn::TransportConfig> {
    let idle = config
        .max_idle_timeout
        .try_into()
        .map_err(|_| TransportError::QuicError("idle timeout out of range".into()))?;

    let mut transport = quinn::TransportConfig::default();
    transport
        .max_concurrent_bidi_streams(config.max_concurrent_streams.into())
        .max_idle_timeout(Some(idle))
        .keep_alive_interval(Some(config.keep_alive_interval));
    Ok(transport)
}

/// Server side QUIC endpoint with a self-signed certificate.
pub struct QuicTransport {
    endpoint: Endpoint,
    /// Keyed by `stable_id`; the remote address changes when a client migrates.
    connections: Arc<DashMap<usize, Connection>>,
    stats: Arc<RwLock<TransportStats>>,
}

impl QuicTransport {
    /// Bind a server endpoint on `config.bind_addr`
    pub fn bind(config: &ConnectionConfig) -> TransportResult<Self> {
        let cert = rcgen::generate_simple_self_signed(vec![config.server_name.clone()])
            .map_err(|e| TransportError::CertificateError(e.to_string()))?;
        let cert_der = cert.cert.der().to_vec();
        let priv_key = rustls::pki_types::PrivateKeyDer::try_from(cert.key_pair.serialize_der())
            .map_err(|e| TransportError::CertificateError(e.to_string()))?;

        let mut server_config = ServerConfig::with_single_cert(
            vec![rustls::pki_types::CertificateDer::from(cert_der)],
            priv_key,
        )
        .map_err(|e| TransportError::CertificateError(e.to_string()))?;
        server_config.transport_config(Arc::new(transport_config(config)?));

        let endpoint = Endpoint::server(server_config, config.bind_addr)
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            endpoint,
            connections: Arc::new(DashMap::new()),
            stats: Arc::new(RwLock::new(TransportStats::default())),
        })
    }

    /// Accept incoming connection
    pub async fn accept(&self) -> TransportResult<Connection> {
        let incoming = self
            .endpoint
            .accept()
            .await
            .ok_or_else(|| TransportError::ConnectionClosed("Endpoint closed".into()))?;

        let conn = incoming.await?;
        self.connections.insert(conn.stable_id(), conn.clone());
        self.stats.write().connections_opened += 1;

        Ok(conn)
    }

    /// Forget a connection once its handler finishes
    pub fn release(&self, conn: &Connection) {
        self.connections.remove(&conn.stable_id());
    }

    pub fn local_addr(&self) -> TransportResult<SocketAddr> {
        self.endpoint.local_addr().map_err(TransportError::IoError)
    }

    pub fn active_connections(&self) -> usize {
        self.connections.len()
    }

    pub fn stats(&self) -> TransportStats {
        self.stats.read().clone()
    }

    /// Close all connections
    pub fn close(&self) {
        for entry in self.connections.iter() {
            entry.value().close(0u32.into(), b"closing");
        }
        self.connections.clear();
    }
}

impl Drop for QuicTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Client side: opens one QUIC connection per call to the configured peer.
pub struct QuicConnector {
    config: ConnectionConfig,
    stats: Arc<RwLock<TransportStats>>,
}

impl QuicConnector {
    pub fn new(config: ConnectionConfig) -> Self {
        if config.insecure_skip_verify {
            tracing::warn!(
                "TLS certificate verification is disabled for {}; only use this against the benchmark server",
                config.remote_addr
            );
        }

        Self {
            config,
            stats: Arc::new(RwLock::new(TransportStats::default())),
        }
    }

    pub fn stats(&self) -> TransportStats {
        self.stats.read().clone()
    }

    /// Create client endpoint
    /// If `insecure_skip_verify` is set, accepts any certificate
    /// Otherwise uses system root certificates for verification
    fn make_client_endpoint(&self) -> TransportResult<Endpoint> {
        let mut endpoint = Endpoint::client(self.config.bind_addr)
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        let crypto = if self.config.insecure_skip_verify {
            rustls::ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(SkipServerVerification))
                .with_no_client_auth()
        } else {
            let mut root_store = rustls::RootCertStore::empty();

            match rustls_native_certs::load_native_certs() {
                Ok(certs) => {
                    for cert in certs {
                        if let Err(e) = root_store.add(cert) {
                            tracing::warn!("Failed to add certificate to root store: {}", e);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to load native certificates: {}. Using webpki roots.",
                        e
                    );
                }
            }

            if root_store.is_empty() {
                root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            }

            rustls::ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth()
        };

        let mut client_config = quinn::ClientConfig::new(Arc::new(
            quinn::crypto::rustls::QuicClientConfig::try_from(crypto)
                .map_err(|e| TransportError::CertificateError(e.to_string()))?,
        ));
        client_config.transport_config(Arc::new(transport_config(&self.config)?));
        endpoint.set_default_client_config(client_config);

        Ok(endpoint)
    }
}

#[async_trait]
impl MultiplexedConnector for QuicConnector {
    type Connection = QuicConnection;

    async fn open_connection(&self) -> TransportResult<QuicConnection> {
        let endpoint = self.make_client_endpoint()?;
        let connection = endpoint
            .connect(self.config.remote_addr, &self.config.server_name)?
            .await?;

        tracing::debug!(
            remote = %self.config.remote_addr,
            local = ?endpoint.local_addr().ok(),
            "QUIC connection established"
        );
        self.stats.write().connections_opened += 1;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Ok(QuicConnection {
            endpoint,
            connection,
            rebind_addr: self.config.bind_addr,
            send_streams: HashMap::new(),
            events_tx,
            events_rx,
            stats: self.stats.clone(),
        })
    }
}

/// A live client connection. Each opened stream gets a reader task that
/// forwards its response into the shared event channel.
pub struct QuicConnection {
    endpoint: Endpoint,
    connection: Connection,
    rebind_addr: SocketAddr,
    send_streams: HashMap<StreamId, SendStream>,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    events_rx: mpsc::UnboundedReceiver<TransportEvent>,
    stats: Arc<RwLock<TransportStats>>,
}

impl QuicConnection {
    pub fn local_addr(&self) -> TransportResult<SocketAddr> {
        self.endpoint.local_addr().map_err(TransportError::IoError)
    }

    fn send_stream(&mut self, stream_id: StreamId) -> TransportResult<&mut SendStream> {
        self.send_streams
            .get_mut(&stream_id)
            .ok_or(TransportError::StreamNotWritable(stream_id))
    }
}

#[async_trait]
impl MultiplexedConnection for QuicConnection {
    async fn open_stream(&mut self) -> TransportResult<StreamId> {
        let (send, recv) = self.connection.open_bi().await?;
        let stream_id = StreamId(send.id().index());

        tokio::spawn(read_response(
            stream_id,
            recv,
            self.events_tx.clone(),
            self.stats.clone(),
        ));
        self.send_streams.insert(stream_id, send);
        self.stats.write().streams_opened += 1;

        Ok(stream_id)
    }

    async fn send_headers(
        &mut self,
        stream_id: StreamId,
        headers: HeaderList,
    ) -> TransportResult<()> {
        let send = self.send_stream(stream_id)?;
        wire::write_headers(send, &headers).await
    }

    async fn send_data(
        &mut self,
        stream_id: StreamId,
        data: Bytes,
        end_stream: bool,
    ) -> TransportResult<()> {
        let send = self.send_stream(stream_id)?;
        if !data.is_empty() {
            send.write_all(&data).await?;
        }

        if end_stream {
            send.finish()
                .map_err(|e| TransportError::SendFailed(e.to_string()))?;
            self.send_streams.remove(&stream_id);
        }
        Ok(())
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events_rx.recv().await
    }

    fn change_path_identifier(&self) -> TransportResult<()> {
        let socket = std::net::UdpSocket::bind(self.rebind_addr)?;
        let new_addr = socket.local_addr()?;
        self.endpoint.rebind(socket)?;
        self.stats.write().path_changes += 1;

        tracing::info!(local = %new_addr, "QUIC endpoint rebound to a new path");
        Ok(())
    }

    fn close(&mut self) {
        self.send_streams.clear();
        self.connection.close(0u32.into(), b"done");
    }
}

impl Drop for QuicConnection {
    fn drop(&mut self) {
        self.connection.close(0u32.into(), b"dropped");
    }
}

async fn read_response(
    stream_id: StreamId,
    mut recv: RecvStream,
    events: mpsc::UnboundedSender<TransportEvent>,
    stats: Arc<RwLock<TransportStats>>,
) {
    let headers = match wire::read_headers(&mut recv).await {
        Ok(headers) => headers,
        Err(e) => {
            let _ = events.send(TransportEvent::StreamReset {
                stream_id,
                reason: e.to_string(),
            });
            return;
        }
    };

    if events
        .send(TransportEvent::HeadersReceived { stream_id, headers })
        .is_err()
    {
        return;
    }

    loop {
        let event = match recv.read_chunk(READ_CHUNK, true).await {
            Ok(Some(chunk)) => {
                stats.write().bytes_received += chunk.bytes.len() as u64;
                TransportEvent::DataReceived {
                    stream_id,
                    data: chunk.bytes,
                    stream_ended: false,
                }
            }
            Ok(None) => {
                let _ = events.send(TransportEvent::DataReceived {
                    stream_id,
                    data: Bytes::new(),
                    stream_ended: true,
                });
                return;
            }
            Err(e) => {
                let _ = events.send(TransportEvent::StreamReset {
                    stream_id,
                    reason: e.to_string(),
                });
                return;
            }
        };

        if events.send(event).is_err() {
            return;
        }
    }
}

// Certificate verifier that accepts any certificate (INSECURE - for testing only)
#[derive(Debug)]
struct SkipServerVerification;

impl rustls::client::danger::ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
            rustls::SignatureScheme::RSA_PSS_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::ED25519,
        ]
    }
}
