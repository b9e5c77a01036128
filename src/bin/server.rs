use anyhow::Context;
use clap::Parser;
use muxbench::server::{http_router, serve_http, serve_quic, ContentRoot};
use muxbench::transport::{ConnectionConfig, QuicTransport};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Serves one directory over QUIC streams and over HTTP/1.1.
#[derive(Parser, Debug)]
#[command(name = "muxbench-server", version)]
struct Args {
    /// Directory holding index.html, bigfile.bin and files/
    #[arg(short, long, default_value = "content")]
    root: PathBuf,

    #[arg(long, default_value = "0.0.0.0:4433")]
    quic_addr: SocketAddr,

    #[arg(long, default_value = "0.0.0.0:8443")]
    http_addr: SocketAddr,

    /// Name on the self-signed certificate
    #[arg(long, default_value = "localhost")]
    server_name: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "muxbench=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        tracing::debug!("rustls crypto provider already installed");
    }

    let args = Args::parse();
    let content = Arc::new(
        ContentRoot::new(&args.root)
            .with_context(|| format!("opening content root {}", args.root.display()))?,
    );

    let transport = Arc::new(QuicTransport::bind(&ConnectionConfig {
        bind_addr: args.quic_addr,
        server_name: args.server_name.clone(),
        ..ConnectionConfig::default()
    })?);
    tracing::info!(addr = %transport.local_addr()?, root = %content.root().display(), "QUIC server listening");

    let listener = tokio::net::TcpListener::bind(args.http_addr)
        .await
        .with_context(|| format!("binding {}", args.http_addr))?;
    let router = http_router(content.root());

    tokio::select! {
        result = serve_quic(transport.clone(), content.clone()) => result?,
        result = serve_http(listener, router) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!(
                connections = transport.stats().connections_opened,
                "shutting down"
            );
        }
    }

    transport.close();
    Ok(())
}
