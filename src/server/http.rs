use crate::server::error::ServerResult;
use axum::Router;
use std::path::Path;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Static files under `root`, `/` answered with `index.html`. `Range`
/// requests get 206 responses, which the baseline resume relies on.
pub fn http_router(root: &Path) -> Router {
    Router::new()
        .fallback_service(ServeDir::new(root).append_index_html_on_directories(true))
        .layer(TraceLayer::new_for_http())
}

pub async fn serve_http(listener: TcpListener, router: Router) -> ServerResult<()> {
    tracing::info!(addr = ?listener.local_addr().ok(), "HTTP/1.1 server listening");
    axum::serve(listener, router).await?;
    Ok(())
}
