//! Prometheus exporter for long sweeps that someone wants to watch live.

use crate::metrics::recorder::init_metrics;
use axum::{routing::get, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Errors that can occur during metrics setup
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Failed to setup metrics: {0}")]
    SetupFailed(String),
}

/// Install the Prometheus recorder and serve `/metrics` on `listen_addr`.
///
/// Only the first call installs anything; later calls return the same handle.
pub async fn start_metrics_server(
    listen_addr: SocketAddr,
) -> Result<&'static PrometheusHandle, MetricsError> {
    init_metrics();

    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle);
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| MetricsError::SetupFailed(e.to_string()))?;
    let handle = PROMETHEUS_HANDLE.get_or_init(|| handle);

    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .map_err(|e| MetricsError::SetupFailed(format!("{listen_addr}: {e}")))?;
    let app = Router::new().route(
        "/metrics",
        get(|| async { render_metrics().unwrap_or_default() }),
    );
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::warn!(error = %e, "metrics endpoint stopped");
        }
    });

    Ok(handle)
}

/// Render the current metrics, if the exporter is running
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|h| h.render())
}
