//! Client handshake and connected-session behaviour against a scripted
//! loopback server.

mod common;

use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::net::UdpSocket;

use common::{FakeServer, SERVER_GUID, STEP, loopback};
use tokio_raknet_lite::protocol::ack::{AckKind, AckNackPayload};
use tokio_raknet_lite::protocol::constants::id;
use tokio_raknet_lite::protocol::packet::{DisconnectionNotification, Packet};
use tokio_raknet_lite::protocol::state::ConnectionState;
use tokio_raknet_lite::protocol::types::Sequence24;
use tokio_raknet_lite::{Message, RaknetClient, RaknetClientConfig, RaknetError, Reliability};

fn fast_config() -> RaknetClientConfig {
    RaknetClientConfig::builder()
        .mtu_probe_timeout(Duration::from_millis(100))
        .connection_timeout(Duration::from_secs(5))
        .keepalive_interval(Duration::from_millis(100))
        .build()
}

async fn wait_until(mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + STEP;
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn connect_negotiates_mtu_and_exchanges_data() {
    let mut server = FakeServer::bind(1200).await;
    let server_addr = server.addr();

    let script = tokio::spawn(async move {
        server.serve_handshake().await;
        server
            .send(Bytes::from_static(b"\xfehello"), Reliability::ReliableOrdered)
            .await;

        // A payload larger than one frame comes back the same way it went out.
        let big = server.next_message().await;
        assert_eq!(big.len(), 3000);
        server.send(big, Reliability::ReliableOrdered).await;

        let bye = server.next_message().await;
        assert_eq!(bye[0], id::DISCONNECTION_NOTIFICATION);
        server.probes
    });

    let mut client = RaknetClient::new(fast_config());
    client.connect(loopback(), server_addr).await.unwrap();

    assert!(client.is_connected());
    assert_eq!(client.state(), ConnectionState::Connected);
    assert_eq!(client.mtu(), Some(1200));
    assert_eq!(client.server_guid(), Some(SERVER_GUID));
    assert_eq!(client.peer_addr(), Some(server_addr));

    let hello = client.receive(STEP).await.unwrap();
    assert_eq!(&hello[..], b"\xfehello");

    let mut body = vec![0xfe];
    body.extend((1..3000u32).map(|i| (i % 253) as u8));
    let big = Bytes::from(body);
    client
        .send(Message::new(big.clone()).reliability(Reliability::ReliableOrdered))
        .await
        .unwrap();
    assert_eq!(client.receive(STEP).await.unwrap(), big);

    client.close().await;
    assert!(!client.is_connected());
    assert_eq!(client.state(), ConnectionState::Disconnected);

    let probes = tokio::time::timeout(STEP, script).await.unwrap().unwrap();
    // Binary search: the first probe is the midpoint of [576, 1492].
    assert_eq!(probes[0], 1034);
    assert!(probes.len() <= 11);
}

#[tokio::test]
async fn connect_returns_immediately_when_connected() {
    let mut server = FakeServer::bind(1492).await;
    let server_addr = server.addr();
    let script = tokio::spawn(async move {
        server.serve_handshake().await;
        server.next_message().await
    });

    let mut client = RaknetClient::new(fast_config());
    client.connect(loopback(), server_addr).await.unwrap();
    assert_eq!(client.mtu(), Some(1492));

    let started = Instant::now();
    client.connect(loopback(), server_addr).await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(50));

    client.close().await;
    let bye = tokio::time::timeout(STEP, script).await.unwrap().unwrap();
    assert_eq!(bye[0], id::DISCONNECTION_NOTIFICATION);
}

#[tokio::test]
async fn keepalive_pings_flow_and_pongs_are_accepted() {
    let mut server = FakeServer::bind(1492).await;
    let server_addr = server.addr();
    let script = tokio::spawn(async move {
        server.serve_handshake().await;
        let first = server.answer_ping().await;
        let second = server.answer_ping().await;
        (first, second)
    });

    let mut client = RaknetClient::new(fast_config());
    client.connect(loopback(), server_addr).await.unwrap();

    let (first, second) = tokio::time::timeout(STEP, script).await.unwrap().unwrap();
    assert!(second.0 >= first.0);
    // Pongs are consumed by the session, never handed to the application.
    assert!(client.receive(Duration::from_millis(200)).await.is_none());
    assert!(client.is_connected());
    client.close().await;
}

#[tokio::test]
async fn peer_disconnect_closes_session() {
    let mut server = FakeServer::bind(1492).await;
    let server_addr = server.addr();
    let script = tokio::spawn(async move {
        server.serve_handshake().await;
        server
            .send(Bytes::from_static(b"\xfelast words"), Reliability::Reliable)
            .await;
        server
            .send(DisconnectionNotification.encode(), Reliability::Reliable)
            .await;
    });

    let mut client = RaknetClient::new(fast_config());
    client.connect(loopback(), server_addr).await.unwrap();
    let local = client.local_addr().unwrap();
    tokio::time::timeout(STEP, script).await.unwrap().unwrap();

    assert!(wait_until(|| !client.is_connected()).await);
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(client.local_addr(), None);
    assert_eq!(client.mtu(), None);
    assert_eq!(client.server_guid(), None);

    // The port is free again without calling close.
    assert!(wait_until(|| std::net::UdpSocket::bind(local).is_ok()).await);
    assert!(matches!(
        client.send("late").await,
        Err(RaknetError::NotConnected)
    ));

    // Messages that arrived before the notification can still be drained.
    assert_eq!(
        client.receive(Duration::ZERO).await.as_deref(),
        Some(&b"\xfelast words"[..])
    );
    client.close().await;
}

#[tokio::test]
async fn nack_triggers_resend_of_identical_datagram() {
    let mut server = FakeServer::bind(1492).await;
    let server_addr = server.addr();
    let script = tokio::spawn(async move {
        server.serve_handshake().await;

        // Find the datagram carrying the application payload.
        let original = loop {
            let datagram = server.recv_raw().await;
            if datagram[0] & 0x80 != 0 && datagram.ends_with(b"\xferetry me") {
                break datagram;
            }
        };
        let sequence = Sequence24::new(u32::from_be_bytes([0, original[1], original[2], original[3]]));
        let nack = AckNackPayload::new(vec![sequence]).encode_datagrams(AckKind::Nack, 1492);
        server.send_raw(&nack[0]).await;

        loop {
            let datagram = server.recv_raw().await;
            if datagram == original {
                return;
            }
        }
    });

    let mut client = RaknetClient::new(fast_config());
    client.connect(loopback(), server_addr).await.unwrap();
    client
        .send(Message::new(&b"\xferetry me"[..]).reliability(Reliability::Reliable))
        .await
        .unwrap();

    tokio::time::timeout(STEP, script).await.unwrap().unwrap();
    client.close().await;
}

#[tokio::test]
async fn connect_to_silent_peer_fails_within_timeout() {
    // Bound but never answers, so no ICMP error short-circuits the probes.
    let silent = UdpSocket::bind(loopback()).await.unwrap();
    let config = RaknetClientConfig::builder()
        .mtu_probe_timeout(Duration::from_millis(500))
        .connection_timeout(Duration::from_millis(300))
        .build();

    let mut client = RaknetClient::new(config);
    let started = Instant::now();
    let result = client.connect(loopback(), silent.local_addr().unwrap()).await;

    assert!(matches!(result, Err(RaknetError::Timeout("connection"))));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(!client.is_connected());
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn mtu_detection_fails_when_no_probe_is_answered() {
    let silent = UdpSocket::bind(loopback()).await.unwrap();
    let config = RaknetClientConfig::builder()
        .mtu_probe_timeout(Duration::from_millis(10))
        .connection_timeout(Duration::from_secs(5))
        .build();

    let mut client = RaknetClient::new(config);
    let result = client.connect(loopback(), silent.local_addr().unwrap()).await;
    assert!(matches!(result, Err(RaknetError::MtuDetectionFailed)));
}

#[tokio::test]
async fn unanswered_connection_request_times_out() {
    let mut server = FakeServer::bind(1492).await;
    server.accept_connection = false;
    let server_addr = server.addr();
    let script = tokio::spawn(async move {
        // Never returns: NewIncomingConnection is never sent.
        let _ = tokio::time::timeout(STEP, server.serve_handshake()).await;
    });

    let config = RaknetClientConfig::builder()
        .mtu_probe_timeout(Duration::from_millis(100))
        .connection_request_timeout(Duration::from_millis(200))
        .build();
    let mut client = RaknetClient::new(config);
    let result = client.connect(loopback(), server_addr).await;

    assert!(matches!(
        result,
        Err(RaknetError::Timeout("connection request accepted"))
    ));
    assert!(!client.is_connected());
    script.abort();
}
