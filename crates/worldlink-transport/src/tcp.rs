//! Length-prefixed TCP transport.
//!
//! The writer half lives behind an async mutex so concurrent senders never
//! interleave frames. The reader half is moved into the receive task by
//! [`MessageTransport::begin_listen`]. Disposal is broadcast over a
//! [`watch`] channel the receive task selects on.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::{watch, Mutex};

use crate::framing::{encode_frame, FrameAssembler, MIN_FRAME_LEN};
use crate::link::Link;
use crate::{
    CloseReason, ConnectionId, MessageTransport, PayloadSink, StatsSnapshot, TransportError,
};

type BoxReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxWriter = Box<dyn AsyncWrite + Send + Unpin>;

// ---------------------------------------------------------------------------
// TcpConfig
// ---------------------------------------------------------------------------

/// Tuning for [`TcpTransport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpConfig {
    /// Size of the fixed scratch buffer each socket read fills.
    pub read_buffer_size: usize,
    /// Largest frame accepted in either direction. A peer announcing more
    /// is treated as framing corruption.
    pub max_frame_len: u32,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: 8192,
            max_frame_len: 16 * 1024 * 1024,
        }
    }
}

impl TcpConfig {
    /// Smallest read buffer worth having.
    pub const MIN_READ_BUFFER: usize = 16;

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// - `read_buffer_size` raised to [`Self::MIN_READ_BUFFER`].
    /// - `max_frame_len` raised to the smallest legal frame.
    pub fn validated(mut self) -> Self {
        if self.read_buffer_size < Self::MIN_READ_BUFFER {
            tracing::warn!(
                size = self.read_buffer_size,
                min = Self::MIN_READ_BUFFER,
                "read_buffer_size too small, clamping"
            );
            self.read_buffer_size = Self::MIN_READ_BUFFER;
        }
        if self.max_frame_len < MIN_FRAME_LEN {
            tracing::warn!(
                len = self.max_frame_len,
                min = MIN_FRAME_LEN,
                "max_frame_len too small, clamping"
            );
            self.max_frame_len = MIN_FRAME_LEN;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// TcpTransport
// ---------------------------------------------------------------------------

/// A framed TCP connection to a world server.
pub struct TcpTransport {
    link: Arc<Link>,
    peer: Option<SocketAddr>,
    config: TcpConfig,
    writer: Arc<Mutex<Option<BoxWriter>>>,
    reader: StdMutex<Option<BoxReader>>,
    /// Sending `true` makes the receive task exit.
    shutdown_tx: watch::Sender<bool>,
}

impl TcpTransport {
    /// Connects to `addr`, giving up after `timeout`.
    ///
    /// This is the only timeout in the transport layer.
    pub async fn connect(
        addr: &str,
        timeout: Duration,
        config: TcpConfig,
    ) -> Result<Self, TransportError> {
        let stream = match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(TransportError::ConnectFailed {
                    addr: addr.to_string(),
                    source,
                });
            }
            Err(_) => {
                return Err(TransportError::ConnectTimeout {
                    addr: addr.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
        };
        Ok(Self::from_stream(stream, config))
    }

    /// Wraps an already connected stream.
    pub fn from_stream(stream: TcpStream, config: TcpConfig) -> Self {
        if let Err(e) = stream.set_nodelay(true) {
            tracing::warn!(error = %e, "could not set TCP_NODELAY");
        }
        let peer = stream.peer_addr().ok();
        let (reader, writer) = stream.into_split();
        Self::from_parts(Box::new(reader), Box::new(writer), peer, config)
    }

    /// Wraps any byte stream, e.g. an in-memory duplex.
    pub fn from_io<S>(io: S, config: TcpConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(io);
        Self::from_parts(Box::new(reader), Box::new(writer), None, config)
    }

    fn from_parts(
        reader: BoxReader,
        writer: BoxWriter,
        peer: Option<SocketAddr>,
        config: TcpConfig,
    ) -> Self {
        let link = Link::new();
        let (shutdown_tx, _) = watch::channel(false);
        tracing::debug!(id = %link.id, ?peer, "tcp transport ready");
        Self {
            link,
            peer,
            config: config.validated(),
            writer: Arc::new(Mutex::new(Some(writer))),
            reader: StdMutex::new(Some(reader)),
            shutdown_tx,
        }
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn config(&self) -> &TcpConfig {
        &self.config
    }
}

impl MessageTransport for TcpTransport {
    fn id(&self) -> ConnectionId {
        self.link.id
    }

    fn is_usable(&self) -> bool {
        self.link.is_usable()
    }

    fn stats(&self) -> StatsSnapshot {
        self.link.stats.snapshot()
    }

    async fn send_payload(&self, payload: &[u8]) -> Result<(), TransportError> {
        self.link.check_sendable()?;
        let frame = encode_frame(payload, self.config.max_frame_len)?;

        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            return Err(TransportError::Disposed);
        };
        let result = match writer.write_all(&frame).await {
            Ok(()) => writer.flush().await,
            Err(e) => Err(e),
        };
        drop(guard);

        if let Err(e) = result {
            self.link.fail(CloseReason::Failed(e.to_string()));
            return Err(TransportError::SendFailed(e));
        }
        self.link.stats.record_sent(frame.len());
        Ok(())
    }

    fn begin_listen(&self, sink: Arc<dyn PayloadSink>) -> Result<(), TransportError> {
        let runtime = Handle::try_current().map_err(|_| TransportError::NoRuntime)?;
        self.link.attach(sink)?;
        let reader = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(reader) = reader else {
            return Err(TransportError::AlreadyListening);
        };

        tracing::debug!(id = %self.link.id, "tcp receive task starting");
        runtime.spawn(read_loop(
            Arc::clone(&self.link),
            reader,
            FrameAssembler::new(self.config.max_frame_len),
            self.config.read_buffer_size,
            self.shutdown_tx.subscribe(),
        ));
        Ok(())
    }

    fn dispose(&self) {
        if !self.link.dispose() {
            return;
        }
        self.shutdown_tx.send_replace(true);
        self.reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        tracing::debug!(id = %self.link.id, "tcp transport disposed");

        // Closing the write half needs the runtime; without one the socket
        // closes when the transport is dropped.
        if let Ok(handle) = Handle::try_current() {
            let writer = Arc::clone(&self.writer);
            handle.spawn(async move {
                if let Some(mut w) = writer.lock().await.take() {
                    let _ = w.shutdown().await;
                }
            });
        }
    }
}

/// Reads until the peer closes, an error occurs, or shutdown is signalled.
async fn read_loop(
    link: Arc<Link>,
    mut reader: BoxReader,
    mut assembler: FrameAssembler,
    buffer_size: usize,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut buf = vec![0u8; buffer_size];
    loop {
        if link.is_disposed() {
            break;
        }
        let read = tokio::select! {
            result = reader.read(&mut buf) => result,
            _ = shutdown_rx.changed() => break,
        };
        if link.is_disposed() {
            break;
        }
        match read {
            Ok(0) => {
                link.fail(CloseReason::PeerClosed);
                break;
            }
            Ok(n) => {
                link.stats.record_bytes_received(n);
                assembler.extend(&buf[..n]);
                if let Err(e) = deliver_frames(&link, &mut assembler) {
                    link.fail(CloseReason::FramingCorrupt(e.to_string()));
                    break;
                }
            }
            Err(e) => {
                link.fail(CloseReason::Failed(
                    TransportError::ReceiveFailed(e).to_string(),
                ));
                break;
            }
        }
    }
    tracing::debug!(id = %link.id, "tcp receive task exiting");
}

fn deliver_frames(
    link: &Link,
    assembler: &mut FrameAssembler,
) -> Result<(), crate::FrameError> {
    while let Some(payload) = assembler.next_frame()? {
        link.deliver(payload);
    }
    Ok(())
}
