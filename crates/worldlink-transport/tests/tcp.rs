//! Integration tests for the framed TCP transport.
//!
//! These spin up a real localhost listener (or an in-memory duplex) and
//! check that payloads survive arbitrary chunking on the way in and are
//! framed correctly on the way out.

#![cfg(feature = "tcp")]

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use worldlink_transport::{
    encode_frame, CloseReason, ConnectionId, MessageTransport, PayloadSink, TcpConfig,
    TcpTransport, TransportError,
};

#[derive(Debug, PartialEq)]
enum Event {
    Payload(Vec<u8>),
    Closed(CloseReason),
}

struct ChannelSink(mpsc::UnboundedSender<Event>);

impl PayloadSink for ChannelSink {
    fn deliver(&self, _: ConnectionId, payload: Vec<u8>) {
        let _ = self.0.send(Event::Payload(payload));
    }

    fn closed(&self, _: ConnectionId, reason: CloseReason) {
        let _ = self.0.send(Event::Closed(reason));
    }
}

fn channel_sink() -> (Arc<ChannelSink>, mpsc::UnboundedReceiver<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(ChannelSink(tx)), rx)
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<Event>) -> Event {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("event should arrive")
        .expect("sink channel open")
}

/// Starts a listener on a random port and returns it with its address.
async fn listener() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    (listener, addr)
}

fn payload(code: i32, body_len: usize) -> Vec<u8> {
    let mut p = code.to_be_bytes().to_vec();
    p.extend((0..body_len).map(|i| (i * 7) as u8));
    p
}

#[tokio::test]
async fn test_connect_and_receive_chunked_frames() {
    let (listener, addr) = listener().await;
    let payloads: Vec<Vec<u8>> = (1..=20).map(|i| payload(i, (i as usize) * 97)).collect();
    let stream: Vec<u8> = payloads
        .iter()
        .flat_map(|p| encode_frame(p, u32::MAX).unwrap())
        .collect();

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut offset = 0;
        while offset < stream.len() {
            // Chunk sizes from 1 byte up, so splits land inside prefixes too.
            let n = rand::rng().random_range(1..=64).min(stream.len() - offset);
            socket.write_all(&stream[offset..offset + n]).await.unwrap();
            socket.flush().await.unwrap();
            offset += n;
            tokio::task::yield_now().await;
        }
        socket
    });

    let transport = TcpTransport::connect(&addr, Duration::from_secs(5), TcpConfig::default())
        .await
        .expect("should connect");
    let (sink, mut rx) = channel_sink();
    transport.begin_listen(sink).unwrap();

    for expected in &payloads {
        assert_eq!(next_event(&mut rx).await, Event::Payload(expected.clone()));
    }
    let _socket = server.await.unwrap();
    assert!(transport.is_usable());
    assert_eq!(transport.stats().packets_received, 20);
}

#[tokio::test]
async fn test_send_writes_length_prefixed_frame() {
    let (listener, addr) = listener().await;
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut prefix = [0u8; 4];
        socket.read_exact(&mut prefix).await.unwrap();
        let mut body = vec![0u8; u32::from_be_bytes(prefix) as usize];
        socket.read_exact(&mut body).await.unwrap();
        body
    });

    let transport = TcpTransport::connect(&addr, Duration::from_secs(5), TcpConfig::default())
        .await
        .unwrap();
    let sent = payload(3, 10);
    transport.send_payload(&sent).await.unwrap();

    assert_eq!(server.await.unwrap(), sent);
    let stats = transport.stats();
    assert_eq!(stats.packets_sent, 1);
    assert_eq!(stats.bytes_sent, 4 + sent.len() as u64);
}

#[tokio::test]
async fn test_connect_refused_is_error() {
    let (listener, addr) = listener().await;
    drop(listener);
    let result = TcpTransport::connect(&addr, Duration::from_secs(5), TcpConfig::default()).await;
    assert!(matches!(result, Err(TransportError::ConnectFailed { .. })));
}

#[tokio::test]
async fn test_peer_close_reports_closed() {
    let (listener, addr) = listener().await;
    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        drop(socket);
    });

    let transport = TcpTransport::connect(&addr, Duration::from_secs(5), TcpConfig::default())
        .await
        .unwrap();
    let (sink, mut rx) = channel_sink();
    transport.begin_listen(sink).unwrap();
    server.await.unwrap();

    assert_eq!(next_event(&mut rx).await, Event::Closed(CloseReason::PeerClosed));
    assert!(!transport.is_usable());
    assert!(transport.send_payload(&payload(1, 0)).await.is_err());
}

#[tokio::test]
async fn test_short_length_is_framing_corruption() {
    let (client, mut server) = tokio::io::duplex(64);
    let transport = TcpTransport::from_io(client, TcpConfig::default());
    let (sink, mut rx) = channel_sink();
    transport.begin_listen(sink).unwrap();

    // One good frame, then a length of 1 which cannot hold a type code.
    let mut bytes = encode_frame(&payload(5, 2), 1024).unwrap();
    bytes.extend_from_slice(&[0, 0, 0, 1, 0xff]);
    server.write_all(&bytes).await.unwrap();

    assert_eq!(next_event(&mut rx).await, Event::Payload(payload(5, 2)));
    let Event::Closed(CloseReason::FramingCorrupt(_)) = next_event(&mut rx).await else {
        panic!("expected framing corruption");
    };
    assert!(!transport.is_usable());
}

#[tokio::test]
async fn test_oversized_length_is_framing_corruption() {
    let (client, mut server) = tokio::io::duplex(64);
    let config = TcpConfig {
        max_frame_len: 128,
        ..TcpConfig::default()
    };
    let transport = TcpTransport::from_io(client, config);
    let (sink, mut rx) = channel_sink();
    transport.begin_listen(sink).unwrap();

    server.write_all(&4096u32.to_be_bytes()).await.unwrap();
    assert!(matches!(
        next_event(&mut rx).await,
        Event::Closed(CloseReason::FramingCorrupt(_))
    ));
}

#[tokio::test]
async fn test_begin_listen_twice_fails() {
    let (client, _server) = tokio::io::duplex(64);
    let transport = TcpTransport::from_io(client, TcpConfig::default());
    let (sink, _rx) = channel_sink();
    transport.begin_listen(sink.clone()).unwrap();
    assert!(matches!(
        transport.begin_listen(sink),
        Err(TransportError::AlreadyListening)
    ));
}

#[tokio::test]
async fn test_dispose_is_idempotent_and_silent() {
    let (client, mut server) = tokio::io::duplex(64);
    let transport = TcpTransport::from_io(client, TcpConfig::default());
    let (sink, mut rx) = channel_sink();
    transport.begin_listen(sink).unwrap();

    transport.dispose();
    transport.dispose();
    assert!(!transport.is_usable());
    assert!(matches!(
        transport.send_payload(&payload(1, 0)).await,
        Err(TransportError::Disposed)
    ));

    // The peer sees EOF once the write half is shut down.
    let mut buf = [0u8; 8];
    let n = tokio::time::timeout(Duration::from_secs(5), server.read(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(n, 0);

    // No close notification after disposal.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_random_payload_sizes_over_duplex() {
    let (client, server) = tokio::io::duplex(256);
    let (mut server_read, mut server_write) = tokio::io::split(server);
    let transport = Arc::new(TcpTransport::from_io(client, TcpConfig::default()));
    let (sink, mut rx) = channel_sink();
    transport.begin_listen(sink).unwrap();

    // Echo server: read raw bytes and write them straight back.
    tokio::spawn(async move {
        let _ = tokio::io::copy(&mut server_read, &mut server_write).await;
    });

    let mut rng = rand::rng();
    let sent: Vec<Vec<u8>> = (0..30)
        .map(|i| payload(i, rng.random_range(0..3000)))
        .collect();
    for p in &sent {
        transport.send_payload(p).await.unwrap();
    }
    for expected in &sent {
        assert_eq!(next_event(&mut rx).await, Event::Payload(expected.clone()));
    }
}

#[test]
fn test_begin_listen_outside_runtime_fails() {
    let (client, _server) = tokio::io::duplex(64);
    let transport = TcpTransport::from_io(client, TcpConfig::default());
    let (sink, _rx) = channel_sink();
    assert!(matches!(
        transport.begin_listen(sink.clone()),
        Err(TransportError::NoRuntime)
    ));

    // The failed call did not use up the sink slot.
    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime.block_on(async { transport.begin_listen(sink).unwrap() });
}
