//! Proxy HTTP server lifecycle management.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::ProxyServerConfig;
use crate::error::ServerError;
use crate::router::build_router;
use crate::state::ProxyState;

async fn bind(config: &ProxyServerConfig) -> Result<TcpListener, ServerError> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| ServerError::Bind(format!("invalid address: {e}")))?;

    TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))
}

async fn serve(listener: TcpListener, state: Arc<ProxyState>) -> Result<(), ServerError> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Proxy server listening");
    }
    axum::serve(listener, build_router(state))
        .await
        .map_err(|e| ServerError::Serve(format!("serve error: {e}")))
}

/// Start the proxy and serve until the process is terminated.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind or the server
/// encounters a fatal I/O error.
pub async fn start_server(state: Arc<ProxyState>) -> Result<(), ServerError> {
    let listener = bind(&state.config.proxy).await?;
    serve(listener, state).await
}

/// Bind the proxy listener and serve it on a background Tokio task.
pub async fn spawn_server(
    state: Arc<ProxyState>,
) -> Result<(JoinHandle<()>, SocketAddr), ServerError> {
    let listener = bind(&state.config.proxy).await?;
    let local = listener
        .local_addr()
        .map_err(|e| ServerError::Bind(format!("no local address: {e}")))?;

    let handle = tokio::spawn(async move {
        if let Err(e) = serve(listener, state).await {
            tracing::error!(error = %e, "Proxy server exited with error");
        }
    });

    info!(%local, "Proxy server spawned on background task");
    Ok((handle, local))
}
