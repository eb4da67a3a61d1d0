//! Bridge client for caller nodes.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, error};

use crate::envelope::{BridgeRequest, BridgeResponse, JsonObject};
use crate::error::{millis, BridgeError};

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for the whole exchange after connecting.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends one request per connection and waits for the correlated reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeClient {
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl Default for BridgeClient {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT)
    }
}

impl BridgeClient {
    /// Create a client with explicit timeouts.
    pub const fn new(connect_timeout: Duration, request_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            request_timeout,
        }
    }

    /// Run `action` on the node at `addr` (`host:port`).
    ///
    /// Never fails: transport and protocol errors are turned into a
    /// synthetic `success:false, status:500` response.
    pub async fn send(&self, addr: &str, action: &str, data: JsonObject) -> BridgeResponse {
        match self.try_send(addr, action, data).await {
            Ok(response) => response,
            Err(e) => {
                error!(addr, action, error = %e, "Bridge request failed");
                BridgeResponse::failure(None, 500, format!("TCP communication failed: {e}"))
            }
        }
    }

    /// Like [`send`](Self::send) but reports failures as [`BridgeError`].
    pub async fn try_send(
        &self,
        addr: &str,
        action: &str,
        data: JsonObject,
    ) -> Result<BridgeResponse, BridgeError> {
        let request = BridgeRequest::new(action, data);
        let line = request.encode()?;

        let stream = match tokio::time::timeout(self.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(BridgeError::Connect {
                    addr: addr.to_owned(),
                    message: e.to_string(),
                });
            }
            Err(_elapsed) => {
                return Err(BridgeError::Connect {
                    addr: addr.to_owned(),
                    message: format!("connect timed out after {}ms", millis(self.connect_timeout)),
                });
            }
        };

        debug!(addr, action, request_id = %request.request_id, "Sending bridge request");
        let reply = tokio::time::timeout(self.request_timeout, exchange(stream, &line))
            .await
            .map_err(|_elapsed| BridgeError::Timeout {
                after_ms: millis(self.request_timeout),
            })??;

        let response = BridgeResponse::decode(&reply)?;
        if let Some(actual) = &response.request_id
            && *actual != request.request_id
        {
            return Err(BridgeError::CorrelationMismatch {
                expected: request.request_id,
                actual: actual.clone(),
            });
        }
        debug!(
            addr,
            action,
            status = response.status,
            success = response.success,
            "Bridge response received"
        );
        Ok(response)
    }
}

async fn exchange(stream: TcpStream, line: &str) -> Result<String, BridgeError> {
    let (read_half, mut write_half) = stream.into_split();
    write_half.write_all(line.as_bytes()).await?;
    write_half.flush().await?;

    let mut reader = BufReader::new(read_half);
    let mut reply = String::new();
    if reader.read_line(&mut reply).await? == 0 {
        return Err(BridgeError::NoResponse);
    }
    Ok(reply)
}
