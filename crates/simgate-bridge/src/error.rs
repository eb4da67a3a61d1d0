//! Error types for the bridge protocol.

/// Errors raised while serving or calling the bridge.
///
/// On the client side every variant is folded into a synthetic `status:500`
/// envelope by [`BridgeClient::send`](crate::client::BridgeClient::send);
/// the distinction matters only for logging and tests.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The listener could not bind.
    #[error("bind error: {0}")]
    Bind(String),

    /// The backend node could not be reached.
    #[error("cannot connect to {addr}: {message}")]
    Connect {
        /// Target address.
        addr: String,
        /// Why the connection failed.
        message: String,
    },

    /// Reading or writing the socket failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The exchange did not complete in time.
    #[error("timed out after {after_ms}ms")]
    Timeout {
        /// The timeout that expired.
        after_ms: u64,
    },

    /// The peer closed the connection without sending a line.
    #[error("no response received from server")]
    NoResponse,

    /// A line was not a valid envelope.
    #[error("invalid envelope: {0}")]
    Decode(String),

    /// The response carried another request's id.
    #[error("response request ID mismatch: expected {expected}, got {actual}")]
    CorrelationMismatch {
        /// The id that was sent.
        expected: String,
        /// The id that came back.
        actual: String,
    },
}

/// Failure reported by an action handler on the backend node.
///
/// The status is sent verbatim in the response envelope.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    /// Status code for the envelope.
    pub status: u16,
    /// Human-readable message for the envelope's `error` field.
    pub message: String,
}

impl HandlerError {
    /// A 400 error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: 400,
            message: message.into(),
        }
    }

    /// A 404 error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: 404,
            message: message.into(),
        }
    }

    /// A 500 error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: 500,
            message: message.into(),
        }
    }
}

pub(crate) fn millis(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
