//! Payload sinks that turn transport bytes into queued messages.
//!
//! One sink per code-space. Sinks run on transport tasks: they decode,
//! push into the dispatcher, and return. Nothing here blocks on handlers.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{trace, warn};
use worldlink_dispatch::{now_millis, ClockSync, Dispatcher};
use worldlink_protocol::{CodeSpace, WireMessage, WorldBody, WorldMessage};
use worldlink_transport::{CloseReason, ConnectionId, PayloadSink};

/// Something the host should react to outside the message queues.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// A connection stopped being usable. The host decides whether to
    /// reconnect; nothing is retried automatically.
    Closed {
        space: CodeSpace,
        connection: ConnectionId,
        reason: CloseReason,
    },
}

/// Envelope levels (aggregates and reassembled fragments) one payload may
/// nest before it is dropped.
pub(crate) const MAX_NESTING_DEPTH: usize = 8;

fn too_deep(depth: usize, len: usize) -> bool {
    if depth > MAX_NESTING_DEPTH {
        warn!(depth, len, "dropping world message nested too deeply");
        return true;
    }
    false
}

fn report_closed(
    events: &mpsc::UnboundedSender<ConnectionEvent>,
    space: CodeSpace,
    connection: ConnectionId,
    reason: CloseReason,
) {
    let event = ConnectionEvent::Closed {
        space,
        connection,
        reason,
    };
    if events.send(event).is_err() {
        trace!(%space, %connection, "client gone, close event dropped");
    }
}

// ---------------------------------------------------------------------------
// Master and world-TCP
// ---------------------------------------------------------------------------

/// Decodes each payload as one `M` and queues it.
pub(crate) struct DirectIngest<M: WireMessage> {
    dispatcher: Arc<Dispatcher<M>>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
}

impl<M: WireMessage> DirectIngest<M> {
    pub(crate) fn new(
        dispatcher: Arc<Dispatcher<M>>,
        events: mpsc::UnboundedSender<ConnectionEvent>,
    ) -> Self {
        Self { dispatcher, events }
    }
}

impl<M: WireMessage> PayloadSink for DirectIngest<M> {
    fn deliver(&self, connection: ConnectionId, payload: Vec<u8>) {
        match M::decode(&payload) {
            Ok(Some(message)) => self.dispatcher.push(message, payload.len()),
            Ok(None) => {}
            Err(e) => {
                warn!(
                    space = %M::CODE_SPACE,
                    %connection,
                    len = payload.len(),
                    error = %e,
                    "dropping malformed message"
                );
            }
        }
    }

    fn closed(&self, connection: ConnectionId, reason: CloseReason) {
        report_closed(&self.events, M::CODE_SPACE, connection, reason);
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// World payloads: fragments are reassembled in place, aggregates are
/// unpacked in envelope order, and server timestamps are mapped to local
/// time before a message is queued.
pub(crate) struct WorldIngest {
    dispatcher: Arc<Dispatcher<WorldMessage>>,
    clock: Arc<ClockSync>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
}

impl WorldIngest {
    pub(crate) fn new(
        dispatcher: Arc<Dispatcher<WorldMessage>>,
        clock: Arc<ClockSync>,
        events: mpsc::UnboundedSender<ConnectionEvent>,
    ) -> Self {
        Self {
            dispatcher,
            clock,
            events,
        }
    }

    /// Decodes and routes one world encoding.
    pub(crate) fn ingest(&self, bytes: &[u8]) {
        self.ingest_nested(bytes, 0);
    }

    fn ingest_nested(&self, bytes: &[u8], depth: usize) {
        if too_deep(depth, bytes.len()) {
            return;
        }
        match WorldMessage::decode(bytes) {
            Ok(Some(message)) => self.route(message, bytes.len(), depth),
            Ok(None) => {}
            Err(e) => {
                warn!(len = bytes.len(), error = %e, "dropping malformed world message");
            }
        }
    }

    fn route(&self, message: WorldMessage, wire_len: usize, depth: usize) {
        let WorldMessage { subject_id, body } = message;
        match body {
            WorldBody::Fragment(fragment) => {
                let number = fragment.message_number;
                if let Some(payload) = self.dispatcher.push_fragment(fragment, wire_len) {
                    let messages = self.expand(&payload, depth + 1);
                    self.dispatcher.complete_fragment(number, messages);
                }
            }
            WorldBody::Aggregated(envelope) => {
                trace!(subject_id, count = envelope.messages.len(), "unpacking aggregate");
                for inner in &envelope.messages {
                    self.ingest_nested(inner, depth + 1);
                }
            }
            body => {
                let message = self.localise(WorldMessage { subject_id, body });
                self.dispatcher.push(message, wire_len);
            }
        }
    }

    /// Decodes a reassembled payload into the messages that take the
    /// placeholder's position. An aggregate yields its members; a fragment
    /// inside is routed on its own.
    fn expand(&self, payload: &[u8], depth: usize) -> Vec<WorldMessage> {
        if too_deep(depth, payload.len()) {
            return Vec::new();
        }
        let message = match WorldMessage::decode(payload) {
            Ok(Some(message)) => message,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(
                    len = payload.len(),
                    error = %e,
                    "reassembled world message does not decode"
                );
                return Vec::new();
            }
        };
        let WorldMessage { subject_id, body } = message;
        match body {
            WorldBody::Aggregated(envelope) => envelope
                .messages
                .iter()
                .flat_map(|inner| self.expand(inner, depth + 1))
                .collect(),
            WorldBody::Fragment(fragment) => {
                self.route(
                    WorldMessage::new(subject_id, WorldBody::Fragment(fragment)),
                    payload.len(),
                    depth,
                );
                Vec::new()
            }
            body => vec![self.localise(WorldMessage { subject_id, body })],
        }
    }

    fn localise(&self, mut message: WorldMessage) -> WorldMessage {
        if let Some(server_ts) = message.timestamp() {
            let local = self.clock.adjust_timestamp(server_ts, now_millis());
            message.body.set_timestamp(local);
        }
        message
    }
}

impl PayloadSink for WorldIngest {
    fn deliver(&self, _connection: ConnectionId, payload: Vec<u8>) {
        self.ingest(&payload);
    }

    fn closed(&self, connection: ConnectionId, reason: CloseReason) {
        report_closed(&self.events, CodeSpace::World, connection, reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use worldlink_dispatch::{DrainLimits, HandlerFlow};
    use worldlink_protocol::fragment::split;
    use worldlink_protocol::world::{Comm, Direction, ServerTime};
    use worldlink_protocol::{Aggregated, Fragment, WorldMessageType};

    fn world_ingest() -> (WorldIngest, Arc<Dispatcher<WorldMessage>>, Arc<ClockSync>) {
        let dispatcher = Arc::new(Dispatcher::new());
        let clock = Arc::new(ClockSync::new());
        let (tx, _rx) = mpsc::unbounded_channel();
        (
            WorldIngest::new(Arc::clone(&dispatcher), Arc::clone(&clock), tx),
            dispatcher,
            clock,
        )
    }

    fn comm(subject: i64, text: &str) -> WorldMessage {
        WorldMessage::new(
            subject,
            WorldBody::Comm(Comm {
                channel: 1,
                message: text.to_string(),
            }),
        )
    }

    fn aggregate(members: Vec<Vec<u8>>) -> Vec<u8> {
        WorldMessage::new(0, WorldBody::Aggregated(Aggregated { messages: members })).to_bytes()
    }

    fn fragment_bytes(fragment: Fragment) -> Vec<u8> {
        WorldMessage::new(0, WorldBody::Fragment(fragment)).to_bytes()
    }

    /// `levels` aggregates wrapped around one message.
    fn nested(levels: usize, inner: &WorldMessage) -> Vec<u8> {
        let mut bytes = inner.to_bytes();
        for _ in 0..levels {
            bytes = aggregate(vec![bytes]);
        }
        bytes
    }

    fn drained(dispatcher: &Dispatcher<WorldMessage>, code: i32) -> Vec<WorldMessage> {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = dispatcher.on(code, move |m: &WorldMessage| {
            sink.lock().unwrap().push(m.clone());
            Ok(HandlerFlow::Continue)
        });
        dispatcher.drain(DrainLimits::UNBOUNDED);
        dispatcher.unregister(id);
        let out = seen.lock().unwrap().clone();
        out
    }

    #[test]
    fn test_aggregate_members_queued_in_order() {
        let (ingest, dispatcher, _) = world_ingest();
        let members = (0..5).map(|i| comm(i, "hi").to_bytes()).collect();
        ingest.ingest(&aggregate(members));

        let seen = drained(&dispatcher, WorldMessageType::Comm.code());
        let subjects: Vec<i64> = seen.iter().map(|m| m.subject_id).collect();
        assert_eq!(subjects, [0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_fragmented_aggregate_expands_in_place() {
        let (ingest, dispatcher, _) = world_ingest();
        let members = (10..13).map(|i| comm(i, &"z".repeat(100)).to_bytes()).collect();
        let mut fragments = split(3, &aggregate(members), 100).into_iter();

        ingest.ingest(&fragment_bytes(fragments.next().unwrap()));
        ingest.ingest(&comm(99, "after").to_bytes());
        for fragment in fragments {
            ingest.ingest(&fragment_bytes(fragment));
        }

        let seen = drained(&dispatcher, WorldMessageType::Comm.code());
        let subjects: Vec<i64> = seen.iter().map(|m| m.subject_id).collect();
        assert_eq!(subjects, [10, 11, 12, 99]);
    }

    #[test]
    fn test_shallow_nesting_is_unpacked() {
        let (ingest, dispatcher, _) = world_ingest();
        ingest.ingest(&nested(MAX_NESTING_DEPTH, &comm(3, "inner")));
        let seen = drained(&dispatcher, WorldMessageType::Comm.code());
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].subject_id, 3);
    }

    #[test]
    fn test_deep_aggregate_nesting_is_dropped() {
        let (ingest, dispatcher, _) = world_ingest();
        ingest.ingest(&nested(5_000, &comm(3, "inner")));
        assert!(dispatcher.is_empty());

        ingest.ingest(&comm(4, "next").to_bytes());
        let seen = drained(&dispatcher, WorldMessageType::Comm.code());
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].subject_id, 4);
    }

    #[test]
    fn test_deep_nesting_inside_fragments_is_dropped() {
        let (ingest, dispatcher, _) = world_ingest();
        let bytes = nested(5_000, &comm(3, "inner"));
        for fragment in split(8, &bytes, 1_400) {
            ingest.ingest(&fragment_bytes(fragment));
        }
        assert!(dispatcher.is_empty());
        assert_eq!(dispatcher.pending_assemblies(), 0);
    }

    #[test]
    fn test_undecodable_reassembly_removes_stub() {
        let (ingest, dispatcher, _) = world_ingest();
        // Subject and an unknown type code, padded past one chunk.
        let mut bytes = 7i64.to_be_bytes().to_vec();
        bytes.extend_from_slice(&9999i32.to_be_bytes());
        bytes.resize(200, 0);
        for fragment in split(1, &bytes, 64) {
            ingest.ingest(&fragment_bytes(fragment));
        }
        assert!(dispatcher.is_empty());
        assert_eq!(dispatcher.pending_assemblies(), 0);
    }

    #[test]
    fn test_timestamps_are_localised() {
        let (ingest, dispatcher, clock) = world_ingest();
        let direction = WorldMessage::new(
            5,
            WorldBody::Direction(Direction {
                timestamp: 1_000,
                ..Direction::default()
            }),
        );
        let before = now_millis();
        ingest.ingest(&direction.to_bytes());

        let seen = drained(&dispatcher, WorldMessageType::Direction.code());
        let local = seen[0].timestamp().unwrap();
        assert!(local >= before);
        assert_eq!(clock.offset(), local - 1_000);
        assert_eq!(clock.server_timestamp(local), 1_000);
    }

    #[test]
    fn test_server_time_is_localised() {
        let (ingest, dispatcher, clock) = world_ingest();
        let message = WorldMessage::new(0, WorldBody::ServerTime(ServerTime { server_time: 42 }));
        ingest.ingest(&message.to_bytes());
        let seen = drained(&dispatcher, WorldMessageType::ServerTime.code());
        assert_eq!(seen[0].timestamp(), Some(clock.offset() + 42));
    }

    #[test]
    fn test_malformed_and_unknown_are_dropped() {
        let (ingest, dispatcher, _) = world_ingest();
        ingest.ingest(&[0, 1, 2]);
        let mut unknown = 1i64.to_be_bytes().to_vec();
        unknown.extend_from_slice(&6i32.to_be_bytes());
        ingest.ingest(&unknown);
        assert!(dispatcher.is_empty());
    }

    #[test]
    fn test_close_becomes_event() {
        let dispatcher = Arc::new(Dispatcher::<WorldMessage>::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ingest = WorldIngest::new(dispatcher, Arc::new(ClockSync::new()), tx);
        let id = ConnectionId::next();
        ingest.closed(id, CloseReason::PeerClosed);
        assert_eq!(
            rx.try_recv().unwrap(),
            ConnectionEvent::Closed {
                space: CodeSpace::World,
                connection: id,
                reason: CloseReason::PeerClosed,
            }
        );
    }
}
