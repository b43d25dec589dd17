//! `WorldClient`: the composition root.
//!
//! Owns one dispatcher per code-space, the clock used to localise world
//! timestamps, and the connection-event queue. Transports are created here
//! (or handed in) and wired to the matching inbound sink; the host keeps the
//! transport handles for sending and disposal.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tracing::{debug, trace};
use worldlink_dispatch::{ClockSync, Dispatcher, DrainReport};
use worldlink_protocol::fragment::split;
use worldlink_protocol::{
    Aggregated, MasterMessage, WireMessage, WorldBody, WorldMessage, WorldTcpMessage,
};
use worldlink_transport::{DatagramConnection, MessageTransport, RdpTransport, TcpTransport};

use crate::config::ClientConfig;
use crate::inbound::{ConnectionEvent, DirectIngest, WorldIngest};
use crate::WorldlinkError;

/// What one [`WorldClient::tick`] did per code-space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub master: DrainReport,
    pub world_tcp: DrainReport,
    pub world: DrainReport,
}

impl TickReport {
    pub fn processed(&self) -> usize {
        self.master.processed + self.world_tcp.processed + self.world.processed
    }
}

/// A client session against one master and one world server.
pub struct WorldClient {
    config: ClientConfig,
    master: Arc<Dispatcher<MasterMessage>>,
    world_tcp: Arc<Dispatcher<WorldTcpMessage>>,
    world: Arc<Dispatcher<WorldMessage>>,
    clock: Arc<ClockSync>,
    next_message_number: AtomicI32,
    events_tx: mpsc::UnboundedSender<ConnectionEvent>,
    events_rx: Mutex<mpsc::UnboundedReceiver<ConnectionEvent>>,
}

impl Default for WorldClient {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

impl WorldClient {
    pub fn new(config: ClientConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            config: config.validated(),
            master: Arc::new(Dispatcher::new()),
            world_tcp: Arc::new(Dispatcher::new()),
            world: Arc::new(Dispatcher::new()),
            clock: Arc::new(ClockSync::new()),
            next_message_number: AtomicI32::new(0),
            events_tx,
            events_rx: Mutex::new(events_rx),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn master(&self) -> &Dispatcher<MasterMessage> {
        &self.master
    }

    pub fn world_tcp(&self) -> &Dispatcher<WorldTcpMessage> {
        &self.world_tcp
    }

    pub fn world(&self) -> &Dispatcher<WorldMessage> {
        &self.world
    }

    pub fn clock(&self) -> &ClockSync {
        &self.clock
    }

    // -- connections --------------------------------------------------------

    /// Opens the character-selection connection to a world server.
    pub async fn connect_world_tcp(&self, addr: &str) -> Result<TcpTransport, WorldlinkError> {
        let transport =
            TcpTransport::connect(addr, self.config.connect_timeout(), self.config.tcp.clone())
                .await?;
        self.listen_world_tcp(&transport)?;
        debug!(addr, id = %transport.id(), "world-tcp connected");
        Ok(transport)
    }

    /// Wraps a master-server datagram connection and starts receiving.
    ///
    /// Fails outside a Tokio runtime.
    pub fn attach_master<C: DatagramConnection>(
        &self,
        conn: C,
    ) -> Result<RdpTransport<C>, WorldlinkError> {
        let transport = RdpTransport::new(conn);
        self.listen_master(&transport)?;
        Ok(transport)
    }

    /// Wraps a world-server datagram connection and starts receiving.
    ///
    /// Fails outside a Tokio runtime.
    pub fn attach_world<C: DatagramConnection>(
        &self,
        conn: C,
    ) -> Result<RdpTransport<C>, WorldlinkError> {
        let transport = RdpTransport::new(conn);
        self.listen_world(&transport)?;
        Ok(transport)
    }

    /// Routes any transport's payloads into the master queue.
    pub fn listen_master<T: MessageTransport>(&self, transport: &T) -> Result<(), WorldlinkError> {
        let sink = DirectIngest::new(Arc::clone(&self.master), self.events_tx.clone());
        transport.begin_listen(Arc::new(sink))?;
        Ok(())
    }

    /// Routes any transport's payloads into the world-TCP queue.
    pub fn listen_world_tcp<T: MessageTransport>(
        &self,
        transport: &T,
    ) -> Result<(), WorldlinkError> {
        let sink = DirectIngest::new(Arc::clone(&self.world_tcp), self.events_tx.clone());
        transport.begin_listen(Arc::new(sink))?;
        Ok(())
    }

    /// Routes any transport's payloads into the world queue.
    pub fn listen_world<T: MessageTransport>(&self, transport: &T) -> Result<(), WorldlinkError> {
        let sink = WorldIngest::new(
            Arc::clone(&self.world),
            Arc::clone(&self.clock),
            self.events_tx.clone(),
        );
        transport.begin_listen(Arc::new(sink))?;
        Ok(())
    }

    // -- sending ------------------------------------------------------------

    pub async fn send_master<T: MessageTransport>(
        &self,
        transport: &T,
        message: &MasterMessage,
    ) -> Result<(), WorldlinkError> {
        send_direct(&self.master, transport, message).await
    }

    pub async fn send_world_tcp<T: MessageTransport>(
        &self,
        transport: &T,
        message: &WorldTcpMessage,
    ) -> Result<(), WorldlinkError> {
        send_direct(&self.world_tcp, transport, message).await
    }

    /// Sends one world message, fragmenting it when its encoding is larger
    /// than `max_fragment_size`. A timestamp in the message is taken as
    /// local time and converted to server time on the way out.
    pub async fn send_world<T: MessageTransport>(
        &self,
        transport: &T,
        message: &WorldMessage,
    ) -> Result<(), WorldlinkError> {
        let bytes = self.outgoing_bytes(message);
        self.send_world_encoded(transport, message.subject_id, bytes).await
    }

    /// Sends several world messages packed into as few aggregate envelopes
    /// as `aggregate_budget` allows. Envelope order is send order.
    pub async fn send_world_batch<T: MessageTransport>(
        &self,
        transport: &T,
        messages: &[WorldMessage],
    ) -> Result<(), WorldlinkError> {
        let encoded = messages.iter().map(|m| self.outgoing_bytes(m)).collect();
        for mut envelope in Aggregated::pack(encoded, self.config.aggregate_budget) {
            if envelope.messages.len() == 1 {
                if let Some(only) = envelope.messages.pop() {
                    self.send_world_encoded(transport, 0, only).await?;
                }
                continue;
            }
            trace!(count = envelope.messages.len(), "sending aggregate");
            let bytes = WorldMessage::new(0, WorldBody::Aggregated(envelope)).to_bytes();
            self.send_world_encoded(transport, 0, bytes).await?;
        }
        Ok(())
    }

    fn outgoing_bytes(&self, message: &WorldMessage) -> Vec<u8> {
        match message.timestamp() {
            Some(local) => {
                let mut outgoing = message.clone();
                outgoing.body.set_timestamp(self.clock.server_timestamp(local));
                outgoing.to_bytes()
            }
            None => message.to_bytes(),
        }
    }

    async fn send_world_encoded<T: MessageTransport>(
        &self,
        transport: &T,
        subject_id: i64,
        bytes: Vec<u8>,
    ) -> Result<(), WorldlinkError> {
        let chunk = self.config.max_fragment_size;
        if bytes.len() <= chunk {
            transport.send_payload(&bytes).await?;
            self.world.record_bytes_sent(bytes.len());
            return Ok(());
        }

        let number = self.next_message_number.fetch_add(1, Ordering::Relaxed);
        let fragments = split(number, &bytes, chunk);
        debug!(number, len = bytes.len(), count = fragments.len(), "fragmenting world message");
        for fragment in fragments {
            let encoded = WorldMessage::new(subject_id, WorldBody::Fragment(fragment)).to_bytes();
            transport.send_payload(&encoded).await?;
            self.world.record_bytes_sent(encoded.len());
        }
        Ok(())
    }

    // -- consumer -----------------------------------------------------------

    /// Drains all three queues with the configured limits. Call once per
    /// frame from the thread that owns the handlers' state.
    pub fn tick(&self) -> TickReport {
        let limits = self.config.drain_limits();
        TickReport {
            master: self.master.drain(limits),
            world_tcp: self.world_tcp.drain(limits),
            world: self.world.drain(limits),
        }
    }

    /// Next pending connection event, if any.
    pub fn poll_event(&self) -> Option<ConnectionEvent> {
        self.events_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_recv()
            .ok()
    }
}

async fn send_direct<M, T>(
    dispatcher: &Dispatcher<M>,
    transport: &T,
    message: &M,
) -> Result<(), WorldlinkError>
where
    M: WireMessage,
    T: MessageTransport,
{
    let bytes = message.to_bytes();
    transport.send_payload(&bytes).await?;
    dispatcher.record_bytes_sent(bytes.len());
    trace!(space = %M::CODE_SPACE, message = message.name(), len = bytes.len(), "sent");
    Ok(())
}
