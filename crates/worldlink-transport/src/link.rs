//! State shared between a transport handle and its receive task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use crate::{CloseReason, ConnectionId, PayloadSink, TransportError, TransportStats};

pub(crate) struct Link {
    pub(crate) id: ConnectionId,
    pub(crate) stats: TransportStats,
    usable: AtomicBool,
    disposed: AtomicBool,
    close_reported: AtomicBool,
    sink: OnceLock<Arc<dyn PayloadSink>>,
}

impl Link {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            id: ConnectionId::next(),
            stats: TransportStats::new(),
            usable: AtomicBool::new(true),
            disposed: AtomicBool::new(false),
            close_reported: AtomicBool::new(false),
            sink: OnceLock::new(),
        })
    }

    pub(crate) fn is_usable(&self) -> bool {
        self.usable.load(Ordering::Acquire)
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Installs the sink. Fails if one is already installed.
    pub(crate) fn attach(&self, sink: Arc<dyn PayloadSink>) -> Result<(), TransportError> {
        if self.is_disposed() {
            return Err(TransportError::Disposed);
        }
        self.sink
            .set(sink)
            .map_err(|_| TransportError::AlreadyListening)
    }

    /// Guards the send path.
    pub(crate) fn check_sendable(&self) -> Result<(), TransportError> {
        if self.is_disposed() {
            return Err(TransportError::Disposed);
        }
        if !self.is_usable() {
            return Err(TransportError::ConnectionClosed(format!(
                "{} is no longer usable",
                self.id
            )));
        }
        Ok(())
    }

    pub(crate) fn deliver(&self, payload: Vec<u8>) {
        self.stats.record_packet_received();
        tracing::trace!(id = %self.id, len = payload.len(), "payload received");
        if let Some(sink) = self.sink.get() {
            sink.deliver(self.id, payload);
        }
    }

    /// Marks the connection unusable and tells the sink, once.
    ///
    /// Silent after disposal.
    pub(crate) fn fail(&self, reason: CloseReason) {
        self.usable.store(false, Ordering::Release);
        if self.is_disposed() || self.close_reported.swap(true, Ordering::AcqRel) {
            return;
        }
        match &reason {
            CloseReason::PeerClosed => tracing::debug!(id = %self.id, "peer closed connection"),
            _ => tracing::error!(id = %self.id, %reason, "connection failed"),
        }
        if let Some(sink) = self.sink.get() {
            sink.closed(self.id, reason);
        }
    }

    /// Returns `true` only for the first call.
    pub(crate) fn dispose(&self) -> bool {
        self.usable.store(false, Ordering::Release);
        !self.disposed.swap(true, Ordering::AcqRel)
    }
}
