//! End-to-end tests for `WorldClient`: real TCP for the world-TCP channel,
//! an in-memory datagram connection for master and world.

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use glam::Vec3;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};
use worldlink::prelude::*;
use worldlink::transport::encode_frame;

// ---------------------------------------------------------------------------
// In-memory datagram connection
// ---------------------------------------------------------------------------

struct Pipe {
    inbound: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    state: StdMutex<DatagramState>,
}

/// The server's end of a [`Pipe`].
struct Server {
    to_client: mpsc::UnboundedSender<Vec<u8>>,
    from_client: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl Server {
    async fn recv(&mut self) -> Vec<u8> {
        tokio::time::timeout(Duration::from_secs(5), self.from_client.recv())
            .await
            .expect("client should send")
            .expect("pipe open")
    }

    fn drain_sent(&mut self) -> Vec<Vec<u8>> {
        let mut sent = Vec::new();
        while let Ok(payload) = self.from_client.try_recv() {
            sent.push(payload);
        }
        sent
    }
}

fn pipe() -> (Pipe, Server) {
    let (to_client, inbound) = mpsc::unbounded_channel();
    let (outbound, from_client) = mpsc::unbounded_channel();
    (
        Pipe {
            inbound: Mutex::new(inbound),
            outbound,
            state: StdMutex::new(DatagramState::Open),
        },
        Server {
            to_client,
            from_client,
        },
    )
}

impl DatagramConnection for Pipe {
    async fn send(&self, payload: &[u8]) -> io::Result<()> {
        self.outbound
            .send(payload.to_vec())
            .map_err(|_| io::Error::from(io::ErrorKind::BrokenPipe))
    }

    async fn receive(&self) -> io::Result<(Vec<u8>, SocketAddr)> {
        match self.inbound.lock().await.recv().await {
            Some(payload) => Ok((payload, "10.1.1.1:7000".parse().unwrap())),
            None => {
                *self.state.lock().unwrap() = DatagramState::Closed;
                Err(io::ErrorKind::ConnectionReset.into())
            }
        }
    }

    fn state(&self) -> DatagramState {
        *self.state.lock().unwrap()
    }

    fn close(&self) {
        *self.state.lock().unwrap() = DatagramState::Closed;
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn comm(subject: i64, text: &str) -> WorldMessage {
    WorldMessage::new(
        subject,
        WorldBody::Comm(Comm {
            channel: 2,
            message: text.to_string(),
        }),
    )
}

fn collect<M>(dispatcher: &Dispatcher<M>, code: i32) -> Arc<StdMutex<Vec<M>>>
where
    M: WireMessage + Clone,
{
    let seen = Arc::new(StdMutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    dispatcher.on(code, move |m: &M| {
        sink.lock().unwrap().push(m.clone());
        Ok(HandlerFlow::Continue)
    });
    seen
}

/// Ticks until `done` holds or five seconds pass.
async fn tick_until(client: &WorldClient, mut done: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !done() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached");
        client.tick();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

fn small_fragments() -> ClientConfig {
    ClientConfig {
        max_fragment_size: 128,
        aggregate_budget: 256,
        ..ClientConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_character_selection_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut prefix = [0u8; 4];
        socket.read_exact(&mut prefix).await.unwrap();
        let mut body = vec![0u8; u32::from_be_bytes(prefix) as usize];
        socket.read_exact(&mut body).await.unwrap();
        let request = WorldTcpMessage::decode(&body).unwrap().unwrap();

        let character = PropertyMap::new()
            .with("characterName", "Ayla")
            .with("level", 12i32);
        let response = WorldTcpMessage::CharacterResponse(CharacterResponse {
            server_version: "2.1".into(),
            world_token: vec![9, 9, 9],
            error_message: String::new(),
            characters: vec![character],
        });
        let frame = encode_frame(&response.to_bytes(), u32::MAX).unwrap();
        socket.write_all(&frame).await.unwrap();
        (request, socket)
    });

    let client = WorldClient::new(ClientConfig::default());
    let seen = collect(client.world_tcp(), WorldTcpMessageType::CharacterResponse.code());
    let tcp = client.connect_world_tcp(&addr).await.unwrap();

    let request = WorldTcpMessage::CharacterRequest(CharacterRequest {
        version: "2.1".into(),
        auth_token: vec![1, 2, 3],
    });
    client.send_world_tcp(&tcp, &request).await.unwrap();
    let (received, _socket) = server.await.unwrap();
    assert_eq!(received, request);

    tick_until(&client, || !seen.lock().unwrap().is_empty()).await;
    let seen = seen.lock().unwrap();
    let WorldTcpMessage::CharacterResponse(response) = &seen[0] else {
        panic!("expected a character response");
    };
    assert_eq!(response.characters[0].get_str("characterName"), Some("Ayla"));
    assert_eq!(response.characters[0].get_i32("level"), Some(12));
    assert!(client.world_tcp().stats().bytes_sent_total > 0);
}

#[tokio::test]
async fn test_world_tcp_connect_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);
    let client = WorldClient::default();
    assert!(matches!(
        client.connect_world_tcp(&addr).await,
        Err(WorldlinkError::Transport(_))
    ));
}

#[tokio::test]
async fn test_master_resolve_roundtrip() {
    let client = WorldClient::default();
    let seen = collect(client.master(), MasterMessageType::ResolveResponse.code());
    let (conn, mut server) = pipe();
    let master = client.attach_master(conn).unwrap();

    let request = MasterMessage::ResolveRequest(ResolveRequest {
        world_id: "meadow".into(),
    });
    client.send_master(&master, &request).await.unwrap();
    assert_eq!(MasterMessage::decode(&server.recv().await).unwrap(), Some(request));

    let response = MasterMessage::ResolveResponse(ResolveResponse {
        world_id: "meadow".into(),
        success: true,
        hostname: "world-3.example".into(),
        port: 5040,
        ..ResolveResponse::default()
    });
    server.to_client.send(response.to_bytes()).unwrap();

    tick_until(&client, || !seen.lock().unwrap().is_empty()).await;
    assert_eq!(seen.lock().unwrap()[0], response);
}

#[tokio::test]
async fn test_large_world_message_is_fragmented_and_reassembled() {
    let sender = WorldClient::new(small_fragments());
    let (out_conn, mut out_server) = pipe();
    let outbound = sender.attach_world(out_conn).unwrap();

    let long = comm(44, &"w".repeat(1000));
    sender.send_world(&outbound, &long).await.unwrap();
    let mut sent = out_server.drain_sent();
    assert!(sent.len() > 1, "expected several fragments, got {}", sent.len());

    // Deliver the fragments to a second client in reverse order, with an
    // ordinary message in between.
    let receiver = WorldClient::new(small_fragments());
    let seen = collect(receiver.world(), WorldMessageType::Comm.code());
    let (in_conn, in_server) = pipe();
    let _inbound = receiver.attach_world(in_conn).unwrap();

    sent.reverse();
    let last = sent.pop().unwrap();
    for payload in sent {
        in_server.to_client.send(payload).unwrap();
    }
    in_server.to_client.send(comm(45, "short").to_bytes()).unwrap();
    in_server.to_client.send(last).unwrap();

    tick_until(&receiver, || seen.lock().unwrap().len() == 2).await;
    let seen = seen.lock().unwrap();
    // The reassembled message holds the place of the first fragment to
    // arrive, ahead of the short one.
    assert_eq!(seen[0], long);
    assert_eq!(seen[1].subject_id, 45);
    assert_eq!(receiver.world().pending_assemblies(), 0);
}

#[tokio::test]
async fn test_batch_is_aggregated_and_unpacked_in_order() {
    let sender = WorldClient::new(small_fragments());
    let (out_conn, mut out_server) = pipe();
    let outbound = sender.attach_world(out_conn).unwrap();

    let batch: Vec<WorldMessage> = (0..30).map(|i| comm(i, "move along")).collect();
    sender.send_world_batch(&outbound, &batch).await.unwrap();
    let sent = out_server.drain_sent();
    assert!(sent.len() < batch.len());

    let receiver = WorldClient::default();
    let seen = collect(receiver.world(), WorldMessageType::Comm.code());
    let (in_conn, in_server) = pipe();
    let _inbound = receiver.attach_world(in_conn).unwrap();
    for payload in sent {
        in_server.to_client.send(payload).unwrap();
    }

    tick_until(&receiver, || seen.lock().unwrap().len() == batch.len()).await;
    assert_eq!(*seen.lock().unwrap(), batch);
}

#[tokio::test]
async fn test_outgoing_timestamp_is_server_time() {
    let client = WorldClient::default();
    let (conn, mut server) = pipe();
    let world = client.attach_world(conn).unwrap();

    // Learn an offset from an incoming stamp first.
    let seen = collect(client.world(), WorldMessageType::ServerTime.code());
    let stamp = WorldMessage::new(0, WorldBody::ServerTime(ServerTime { server_time: 10_000 }));
    server.to_client.send(stamp.to_bytes()).unwrap();
    tick_until(&client, || !seen.lock().unwrap().is_empty()).await;
    let offset = client.clock().offset();

    let local = seen.lock().unwrap()[0].timestamp().unwrap();
    let heading = WorldMessage::new(
        1,
        WorldBody::Direction(Direction {
            timestamp: local + 250,
            direction: Vec3::X,
            location: Vec3::new(1.0, 0.0, 3.0),
        }),
    );
    client.send_world(&world, &heading).await.unwrap();
    let sent = WorldMessage::decode(&server.recv().await).unwrap().unwrap();
    assert_eq!(sent.timestamp(), Some(local + 250 - offset));
    assert_eq!(sent.timestamp(), Some(10_250));
}

#[tokio::test]
async fn test_peer_close_surfaces_event() {
    let client = WorldClient::default();
    let (conn, server) = pipe();
    let world = client.attach_world(conn).unwrap();
    drop(server);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    let event = loop {
        if let Some(event) = client.poll_event() {
            break event;
        }
        assert!(tokio::time::Instant::now() < deadline, "no close event");
        tokio::time::sleep(Duration::from_millis(5)).await;
    };
    let ConnectionEvent::Closed { space, connection, reason } = event;
    assert_eq!(space, worldlink::protocol::CodeSpace::World);
    assert_eq!(connection, world.id());
    assert_eq!(reason, CloseReason::PeerClosed);
    assert!(!world.is_usable());
    assert!(client.poll_event().is_none());
}

#[tokio::test]
async fn test_tick_respects_drain_limits() {
    let client = WorldClient::new(ClientConfig {
        drain_max_messages: 3,
        ..ClientConfig::default()
    });
    let seen = collect(client.world(), WorldMessageType::Comm.code());
    let (conn, server) = pipe();
    let _world = client.attach_world(conn).unwrap();
    for i in 0..7 {
        server.to_client.send(comm(i, "queued").to_bytes()).unwrap();
    }

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while client.world().len() < 7 {
        assert!(tokio::time::Instant::now() < deadline, "messages not queued");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let report = client.tick();
    assert_eq!(report.world.processed, 3);
    assert_eq!(report.world.outcome, DrainOutcome::Limit);
    assert_eq!(report.master.outcome, DrainOutcome::Empty);
    assert_eq!(report.processed(), 3);
    client.tick();
    let report = client.tick();
    assert_eq!(report.world.processed, 1);
    assert_eq!(seen.lock().unwrap().len(), 7);
}
