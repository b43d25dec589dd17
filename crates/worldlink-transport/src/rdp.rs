//! Transport over a reliable-datagram connection.
//!
//! The datagram layer itself (sequencing, retransmission, congestion) is
//! somebody else's problem: it is consumed through [`DatagramConnection`].
//! One successful `receive` is one complete payload, so there is no
//! framing here.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::link::Link;
use crate::{
    CloseReason, ConnectionId, MessageTransport, PayloadSink, StatsSnapshot, TransportError,
};

/// Lifecycle of the underlying datagram connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatagramState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// A reliable, message-oriented connection provided by the host.
///
/// The futures must be `Send` because the receive loop runs on a spawned
/// task.
pub trait DatagramConnection: Send + Sync + 'static {
    /// Sends one datagram.
    fn send(&self, payload: &[u8]) -> impl Future<Output = std::io::Result<()>> + Send;

    /// Waits for the next datagram and the endpoint it came from.
    fn receive(&self) -> impl Future<Output = std::io::Result<(Vec<u8>, SocketAddr)>> + Send;

    fn state(&self) -> DatagramState;

    /// Closes the connection. Must be idempotent.
    fn close(&self);
}

/// A [`MessageTransport`] over a [`DatagramConnection`].
pub struct RdpTransport<C: DatagramConnection> {
    link: Arc<Link>,
    conn: Arc<C>,
    /// Sending `true` makes the receive task exit.
    shutdown_tx: watch::Sender<bool>,
}

impl<C: DatagramConnection> RdpTransport<C> {
    pub fn new(conn: C) -> Self {
        Self::from_arc(Arc::new(conn))
    }

    /// Wraps a connection the host keeps a handle to.
    pub fn from_arc(conn: Arc<C>) -> Self {
        let link = Link::new();
        let (shutdown_tx, _) = watch::channel(false);
        tracing::debug!(id = %link.id, "datagram transport ready");
        Self {
            link,
            conn,
            shutdown_tx,
        }
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }
}

impl<C: DatagramConnection> MessageTransport for RdpTransport<C> {
    fn id(&self) -> ConnectionId {
        self.link.id
    }

    fn is_usable(&self) -> bool {
        self.link.is_usable() && self.conn.state() != DatagramState::Closed
    }

    fn stats(&self) -> StatsSnapshot {
        self.link.stats.snapshot()
    }

    async fn send_payload(&self, payload: &[u8]) -> Result<(), TransportError> {
        self.link.check_sendable()?;
        if let Err(e) = self.conn.send(payload).await {
            self.link.fail(CloseReason::Failed(e.to_string()));
            return Err(TransportError::SendFailed(e));
        }
        self.link.stats.record_sent(payload.len());
        Ok(())
    }

    fn begin_listen(&self, sink: Arc<dyn PayloadSink>) -> Result<(), TransportError> {
        let runtime = Handle::try_current().map_err(|_| TransportError::NoRuntime)?;
        self.link.attach(sink)?;
        tracing::debug!(id = %self.link.id, "datagram receive task starting");
        runtime.spawn(receive_loop(
            Arc::clone(&self.link),
            Arc::clone(&self.conn),
            self.shutdown_tx.subscribe(),
        ));
        Ok(())
    }

    fn dispose(&self) {
        if !self.link.dispose() {
            return;
        }
        self.shutdown_tx.send_replace(true);
        self.conn.close();
        tracing::debug!(id = %self.link.id, "datagram transport disposed");
    }
}

/// One outstanding receive at a time; re-armed only after delivery.
async fn receive_loop<C: DatagramConnection>(
    link: Arc<Link>,
    conn: Arc<C>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        if link.is_disposed() {
            break;
        }
        let received = tokio::select! {
            result = conn.receive() => result,
            _ = shutdown_rx.changed() => break,
        };
        // A receive that lands after disposal is stale.
        if link.is_disposed() {
            tracing::trace!(id = %link.id, "discarding receive completed after dispose");
            break;
        }
        match received {
            Ok((payload, remote)) => {
                if conn.state() == DatagramState::Closed {
                    tracing::trace!(id = %link.id, %remote, "discarding datagram on closed connection");
                    link.fail(CloseReason::PeerClosed);
                    break;
                }
                link.stats.record_bytes_received(payload.len());
                link.deliver(payload);
            }
            Err(e) => {
                if conn.state() == DatagramState::Closed {
                    link.fail(CloseReason::PeerClosed);
                } else {
                    link.fail(CloseReason::Failed(
                        TransportError::ReceiveFailed(e).to_string(),
                    ));
                }
                break;
            }
        }
    }
    tracing::debug!(id = %link.id, "datagram receive task exiting");
}
