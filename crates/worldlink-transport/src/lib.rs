//! Transport layer for Worldlink.
//!
//! Provides the [`MessageTransport`] trait that both client channels sit
//! behind, and the [`PayloadSink`] trait through which a transport hands
//! complete payloads (and its own demise) to whoever is listening.
//!
//! Two implementations:
//!
//! - [`TcpTransport`]: length-prefixed frames over a TCP stream, used for
//!   the world server's character-selection handshake.
//! - [`RdpTransport`]: one payload per datagram over an externally
//!   provided reliable-datagram connection ([`DatagramConnection`]).
//!
//! # Feature Flags
//!
//! - `tcp` (default): the TCP transport.

#![allow(async_fn_in_trait)]

mod error;
mod framing;
mod link;
mod rdp;
mod stats;
#[cfg(feature = "tcp")]
mod tcp;

pub use error::TransportError;
pub use framing::{encode_frame, FrameAssembler, FrameError, LENGTH_PREFIX_LEN, MIN_FRAME_LEN};
pub use rdp::{DatagramConnection, DatagramState, RdpTransport};
pub use stats::{StatsSnapshot, TransportStats};
#[cfg(feature = "tcp")]
pub use tcp::{TcpConfig, TcpTransport};

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use worldlink_protocol::WireMessage;

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates a process-unique id.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Why a connection stopped delivering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer closed its end.
    PeerClosed,
    /// A send or receive failed.
    Failed(String),
    /// The TCP stream carried an impossible frame length.
    FramingCorrupt(String),
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeerClosed => write!(f, "peer closed"),
            Self::Failed(e) => write!(f, "failed: {e}"),
            Self::FramingCorrupt(e) => write!(f, "framing corrupt: {e}"),
        }
    }
}

/// Receives what a listening transport produces.
///
/// Called from the transport's I/O task. Implementations must not block;
/// the usual implementation decodes and pushes onto a dispatcher queue.
pub trait PayloadSink: Send + Sync + 'static {
    /// One complete `[type code][body]` payload (world channel:
    /// `[subject id][type code][body]`).
    fn deliver(&self, connection: ConnectionId, payload: Vec<u8>);

    /// The connection failed or the peer closed it. Not called after
    /// [`MessageTransport::dispose`]. Called at most once.
    fn closed(&self, connection: ConnectionId, reason: CloseReason);
}

/// A connection that carries whole protocol payloads.
pub trait MessageTransport: Send + Sync + 'static {
    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;

    /// `false` once the connection failed, closed, or was disposed.
    fn is_usable(&self) -> bool;

    /// Byte and packet counters.
    fn stats(&self) -> StatsSnapshot;

    /// Sends one complete payload.
    async fn send_payload(&self, payload: &[u8]) -> Result<(), TransportError>;

    /// Encodes and sends a message.
    async fn send<M: WireMessage + Sync>(&self, message: &M) -> Result<(), TransportError> {
        let bytes = message.to_bytes();
        tracing::trace!(
            id = %self.id(),
            message = message.name(),
            len = bytes.len(),
            "sending message"
        );
        self.send_payload(&bytes).await
    }

    /// Starts the receive task, which hands payloads to `sink`.
    ///
    /// May be called once; a second call fails with
    /// [`TransportError::AlreadyListening`]. Outside a tokio runtime it
    /// fails with [`TransportError::NoRuntime`] and the sink is not kept.
    fn begin_listen(&self, sink: Arc<dyn PayloadSink>) -> Result<(), TransportError>;

    /// Stops receiving and closes the connection.
    ///
    /// Idempotent and infallible. The sink is not notified.
    fn dispose(&self);
}
