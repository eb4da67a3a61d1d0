//! Bridge server for backend nodes.
//!
//! One acceptor task accepts connections; each connection is handled on
//! its own task but only `workers` connections are served at once, the
//! rest wait for a permit. A connection carries exactly one exchange:
//!
//! ```text
//! AwaitingRequest -> Decoding -> AwaitingExecution -> Responding -> Closed
//! ```
//!
//! The action itself runs on the execution context via
//! [`ContextHandle::submit_within`]. When the handoff times out the worker
//! replies `408` and moves on; the queued task is not cancelled.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use simgate_core::config::BridgeConfig;
use simgate_core::context::{ContextError, ContextHandle};
use simgate_core::state::SimulationState;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::envelope::{BridgeRequest, BridgeResponse, JsonObject};
use crate::error::{millis, BridgeError, HandlerError};

/// Upper bound on the size of one request line.
pub const MAX_REQUEST_BYTES: u64 = 1_048_576;

/// The set of actions a backend node answers.
///
/// `execute` runs on the execution context thread with exclusive access to
/// the live state.
pub trait ActionTable: Send + Sync + 'static {
    /// Whether `action` is known.
    fn contains(&self, action: &str) -> bool;

    /// Run `action` with the request's `data` object.
    fn execute(
        &self,
        action: &str,
        data: &JsonObject,
        world: &mut SimulationState,
    ) -> Result<JsonObject, HandlerError>;
}

/// Tunables of a bridge server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeSettings {
    /// Connections served concurrently.
    pub workers: usize,
    /// How long a worker waits for the execution context.
    pub handoff_timeout: Duration,
    /// How long a worker waits for the request line.
    pub read_timeout: Duration,
}

impl From<&BridgeConfig> for BridgeSettings {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            workers: config.workers.max(1),
            handoff_timeout: Duration::from_millis(config.handoff_timeout_ms),
            read_timeout: Duration::from_millis(config.read_timeout_ms),
        }
    }
}

struct Dispatcher {
    settings: BridgeSettings,
    context: ContextHandle,
    table: Arc<dyn ActionTable>,
}

/// A bound bridge listener.
pub struct BridgeServer {
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
}

impl std::fmt::Debug for BridgeServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeServer")
            .field("local_addr", &self.listener.local_addr().ok())
            .field("settings", &self.dispatcher.settings)
            .finish_non_exhaustive()
    }
}

impl BridgeServer {
    /// Bind to `addr` (for example `0.0.0.0:25599`).
    pub async fn bind(
        addr: &str,
        settings: BridgeSettings,
        context: ContextHandle,
        table: Arc<dyn ActionTable>,
    ) -> Result<Self, BridgeError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| BridgeError::Bind(format!("bind failed on {addr}: {e}")))?;
        Ok(Self {
            listener,
            dispatcher: Arc::new(Dispatcher {
                settings,
                context,
                table,
            }),
        })
    }

    /// The address actually bound.
    pub fn local_addr(&self) -> Result<SocketAddr, BridgeError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the task is aborted.
    pub async fn serve(self) {
        self.serve_until(std::future::pending()).await;
    }

    /// Accept connections until `shutdown` resolves, then wait for the
    /// connections already accepted (served or still queued for a worker)
    /// to finish.
    pub async fn serve_until(self, shutdown: impl Future<Output = ()>) {
        let pool_size = self.dispatcher.settings.workers;
        let workers = Arc::new(Semaphore::new(pool_size));
        if let Ok(addr) = self.listener.local_addr() {
            info!(%addr, workers = self.dispatcher.settings.workers, "Bridge server listening");
        }

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "Bridge connection accepted");
                        let dispatcher = Arc::clone(&self.dispatcher);
                        let workers = Arc::clone(&workers);
                        tokio::spawn(async move {
                            let Ok(_permit) = workers.acquire_owned().await else {
                                return;
                            };
                            dispatcher.handle_connection(stream, peer).await;
                        });
                    }
                    Err(e) => warn!(error = %e, "Error accepting bridge connection"),
                },
            }
        }

        drop(self.listener);
        info!("Bridge server stopped accepting, draining connections");
        // Permits are handed out in FIFO order, so the whole pool is only
        // available once every queued connection has been served.
        if let Ok(all) = u32::try_from(pool_size) {
            let _ = workers.acquire_many(all).await;
        }
        info!("Bridge server stopped");
    }
}

impl Dispatcher {
    async fn handle_connection(&self, stream: TcpStream, peer: SocketAddr) {
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half.take(MAX_REQUEST_BYTES));
        let mut line = String::new();

        match tokio::time::timeout(self.settings.read_timeout, reader.read_line(&mut line)).await {
            Err(_elapsed) => {
                warn!(%peer, timeout_ms = millis(self.settings.read_timeout), "Bridge read timed out");
                return;
            }
            Ok(Err(e)) => {
                warn!(%peer, error = %e, "Error reading bridge request");
                return;
            }
            Ok(Ok(0)) => {
                debug!(%peer, "Bridge connection closed without a request");
                return;
            }
            Ok(Ok(_)) => {}
        }

        let response = self.respond(&line).await;
        let status = response.status;
        let encoded = response.encode();
        if let Err(e) = write_half.write_all(encoded.as_bytes()).await {
            warn!(%peer, error = %e, "Error writing bridge response");
            return;
        }
        if let Err(e) = write_half.shutdown().await {
            debug!(%peer, error = %e, "Error closing bridge connection");
        }
        debug!(%peer, status, bytes = encoded.len(), "Bridge response sent");
    }

    /// Produce the response for one request line.
    async fn respond(&self, line: &str) -> BridgeResponse {
        let request = match BridgeRequest::decode(line) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Invalid bridge request");
                return BridgeResponse::failure(None, 400, format!("Invalid request format: {e}"));
            }
        };

        let BridgeRequest {
            action,
            request_id,
            data,
        } = request;

        if !self.table.contains(&action) {
            warn!(action = %action, request_id = %request_id, "Unknown bridge action");
            return BridgeResponse::failure(
                Some(request_id),
                400,
                format!("Unknown action: {action}"),
            );
        }

        debug!(action = %action, request_id = %request_id, "Dispatching bridge action");
        let table = Arc::clone(&self.table);
        let task_action = action.clone();
        let outcome = self
            .context
            .submit_within(self.settings.handoff_timeout, move |world| {
                table.execute(&task_action, &data, world)
            })
            .await;

        match outcome {
            Ok(Ok(body)) => BridgeResponse::success(request_id, body),
            Ok(Err(handler_error)) => {
                debug!(action = %action, status = handler_error.status, error = %handler_error, "Bridge action failed");
                BridgeResponse::failure(Some(request_id), handler_error.status, handler_error.message)
            }
            Err(ContextError::Timeout { after_ms }) => {
                error!(action = %action, request_id = %request_id, after_ms, "Bridge action timed out");
                BridgeResponse::failure(Some(request_id), 408, "Request processing timed out")
            }
            Err(e) => {
                error!(action = %action, request_id = %request_id, error = %e, "Bridge action crashed");
                BridgeResponse::failure(Some(request_id), 500, format!("Internal server error: {e}"))
            }
        }
    }
}

/// Bind the bridge listener described by `config` and serve it on a
/// background task until `shutdown` resolves.
///
/// Binding happens before this returns, so a port conflict is reported
/// to the caller rather than logged from the background task. The
/// returned task completes once in-flight connections have drained.
pub async fn spawn_bridge(
    config: &BridgeConfig,
    context: ContextHandle,
    table: Arc<dyn ActionTable>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(JoinHandle<()>, SocketAddr), BridgeError> {
    let addr = format!("{}:{}", config.host, config.port);
    let server = BridgeServer::bind(&addr, BridgeSettings::from(config), context, table).await?;
    let local = server.local_addr()?;
    let handle = tokio::spawn(server.serve_until(shutdown));
    info!(%local, "Bridge server spawned on background task");
    Ok((handle, local))
}
