use crate::FrameError;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Establishing the TCP connection failed.
    #[error("connect to {addr} failed: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The TCP connection was not established within the timeout.
    #[error("connect to {addr} timed out after {timeout_ms} ms")]
    ConnectTimeout { addr: String, timeout_ms: u64 },

    /// The connection is no longer usable.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// The byte stream no longer lines up with frame boundaries, or an
    /// outgoing payload cannot be framed.
    #[error(transparent)]
    Framing(#[from] FrameError),

    /// `begin_listen` was called outside a Tokio runtime.
    #[error("no tokio runtime to run the receive task on")]
    NoRuntime,

    /// `begin_listen` was called a second time.
    #[error("transport is already listening")]
    AlreadyListening,

    /// The transport was disposed.
    #[error("transport disposed")]
    Disposed,
}
