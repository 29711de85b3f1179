//! A scripted loopback peer that speaks the server half of the handshake
//! using the crate's own codecs and `Session`.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;

use tokio_raknet_lite::Reliability;
use tokio_raknet_lite::protocol::{
    constants::{SYSTEM_ADDRESS_COUNT, id},
    packet::{
        ConnectedPong, ConnectionRequest, ConnectionRequestAccepted, OpenConnectionReply1,
        OpenConnectionReply2, OpenConnectionRequest2, Packet,
    },
    types::RaknetTime,
};
use tokio_raknet_lite::session::{Incoming, Session};

pub const SERVER_GUID: u64 = 0x5EED_0000_0000_0001;
pub const STEP: Duration = Duration::from_secs(5);

pub fn loopback() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

pub struct FakeServer {
    pub socket: UdpSocket,
    /// Largest OpenConnectionRequest1 size answered.
    pub accept_mtu: u16,
    /// Whether ConnectionRequest is answered.
    pub accept_connection: bool,
    pub peer: Option<SocketAddr>,
    pub session: Option<Session>,
    pub probes: Vec<u16>,
    pending: VecDeque<Bytes>,
}

impl FakeServer {
    pub async fn bind(accept_mtu: u16) -> Self {
        Self {
            socket: UdpSocket::bind(loopback()).await.unwrap(),
            accept_mtu,
            accept_connection: true,
            peer: None,
            session: None,
            probes: Vec::new(),
            pending: VecDeque::new(),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.socket.local_addr().unwrap()
    }

    pub async fn recv_raw(&mut self) -> Bytes {
        let mut buf = vec![0u8; 2048];
        let (len, peer) = tokio::time::timeout(STEP, self.socket.recv_from(&mut buf))
            .await
            .expect("fake server timed out waiting for a datagram")
            .unwrap();
        self.peer = Some(peer);
        Bytes::copy_from_slice(&buf[..len])
    }

    pub async fn send_raw(&self, bytes: &[u8]) {
        self.socket
            .send_to(bytes, self.peer.expect("no peer yet"))
            .await
            .unwrap();
    }

    /// Answers offline requests until the first connected datagram opens a
    /// session, then answers the connection request and waits for
    /// NewIncomingConnection.
    pub async fn serve_handshake(&mut self) {
        loop {
            let datagram = self.recv_raw().await;
            match datagram[0] {
                id::OPEN_CONNECTION_REQUEST_1 => {
                    let mtu = (datagram.len() + 28) as u16;
                    self.probes.push(mtu);
                    if mtu <= self.accept_mtu {
                        let reply = OpenConnectionReply1 {
                            server_guid: SERVER_GUID,
                            server_has_security: false,
                            mtu,
                        };
                        self.send_raw(&reply.encode()).await;
                    }
                }
                id::OPEN_CONNECTION_REQUEST_2 => {
                    let request = OpenConnectionRequest2::decode(&mut datagram.clone()).unwrap();
                    let reply = OpenConnectionReply2 {
                        server_guid: SERVER_GUID,
                        client_address: self.peer,
                        mtu: request.mtu,
                        encryption_enabled: false,
                    };
                    self.session = Some(Session::new(request.mtu));
                    self.send_raw(&reply.encode()).await;
                }
                _ => {
                    for message in self.handle(datagram).await {
                        match message[0] {
                            id::CONNECTION_REQUEST if self.accept_connection => {
                                let request = ConnectionRequest::decode(&mut message.clone()).unwrap();
                                let accepted = ConnectionRequestAccepted {
                                    client_address: self.peer,
                                    system_index: 0,
                                    system_addresses: [None; SYSTEM_ADDRESS_COUNT],
                                    incoming_timestamp: request.timestamp,
                                    server_timestamp: RaknetTime::now(),
                                };
                                self.send(accepted.encode(), Reliability::Reliable).await;
                            }
                            id::NEW_INCOMING_CONNECTION => return,
                            _ => {}
                        }
                    }
                }
            }
        }
    }

    /// Feeds one connected datagram through the session and flushes ACKs.
    pub async fn handle(&mut self, datagram: Bytes) -> Vec<Bytes> {
        let session = self.session.as_mut().expect("no session yet");
        let messages = match session.handle_datagram(datagram) {
            Ok(Incoming::Messages(messages)) => messages,
            _ => Vec::new(),
        };
        let acks = session.take_ack_datagrams();
        for ack in acks {
            self.send_raw(&ack).await;
        }
        messages
    }

    pub async fn send(&mut self, payload: Bytes, reliability: Reliability) {
        let datagrams = self
            .session
            .as_mut()
            .expect("no session yet")
            .queue_packet(payload, reliability)
            .unwrap();
        for datagram in datagrams {
            self.send_raw(&datagram).await;
        }
    }

    /// Next message of any kind, keep-alive pings included.
    pub async fn next_any(&mut self) -> Bytes {
        loop {
            if let Some(message) = self.pending.pop_front() {
                return message;
            }
            let datagram = self.recv_raw().await;
            let messages = self.handle(datagram).await;
            self.pending.extend(messages);
        }
    }

    /// Next message that is not part of the keep-alive exchange.
    pub async fn next_message(&mut self) -> Bytes {
        loop {
            let message = self.next_any().await;
            if message[0] != id::CONNECTED_PING && message[0] != id::CONNECTED_PONG {
                return message;
            }
        }
    }

    /// Replies to the next connected ping and returns its timestamp.
    pub async fn answer_ping(&mut self) -> RaknetTime {
        loop {
            let message = self.next_any().await;
            if message[0] == id::CONNECTED_PING {
                let ping =
                    tokio_raknet_lite::protocol::packet::ConnectedPing::decode(&mut message.clone())
                        .unwrap();
                let pong = ConnectedPong {
                    ping_timestamp: ping.timestamp,
                    pong_timestamp: RaknetTime::now(),
                };
                self.send(pong.encode(), Reliability::Reliable).await;
                return ping.timestamp;
            }
        }
    }
}
