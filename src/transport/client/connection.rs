use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::RaknetError;
use crate::protocol::{
    ack::AckKind,
    constants::RECV_BUFFER_SIZE,
    packet::{
        ConnectedPing, ConnectedPong, ConnectionRequestAccepted, DisconnectionNotification, Packet,
        RaknetPacket,
    },
    reliability::Reliability,
    state::ConnectionState,
    types::RaknetTime,
};
use crate::session::{Incoming, Session};
use crate::transport::is_transient;

/// State shared by the client handle, the receive task and the keep-alive
/// task of one connected session.
///
/// Neither mutex is held across an await point. The socket slot is emptied
/// by `shutdown`, so the port is released once in-flight sends finish.
pub(super) struct Connection {
    socket: Mutex<Option<Arc<UdpSocket>>>,
    peer: SocketAddr,
    server_guid: u64,
    session: Mutex<Session>,
    state: Arc<Mutex<ConnectionState>>,
    inbound: mpsc::UnboundedSender<Bytes>,
    cancel: CancellationToken,
}

impl Connection {
    pub(super) fn new(
        socket: UdpSocket,
        peer: SocketAddr,
        server_guid: u64,
        mtu: u16,
        state: Arc<Mutex<ConnectionState>>,
        inbound: mpsc::UnboundedSender<Bytes>,
    ) -> Self {
        Self {
            socket: Mutex::new(Some(Arc::new(socket))),
            peer,
            server_guid,
            session: Mutex::new(Session::new(mtu)),
            state,
            inbound,
            cancel: CancellationToken::new(),
        }
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn socket(&self) -> io::Result<Arc<UdpSocket>> {
        self.socket
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| io::ErrorKind::NotConnected.into())
    }

    pub(super) fn mtu(&self) -> u16 {
        self.session().mtu()
    }

    pub(super) fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub(super) fn server_guid(&self) -> u64 {
        self.server_guid
    }

    pub(super) fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket()?.local_addr()
    }

    pub(super) fn is_open(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Marks the session disconnected, stops both background tasks and
    /// drops the socket.
    pub(super) fn shutdown(&self) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = ConnectionState::Disconnected;
        self.cancel.cancel();
        self.socket.lock().unwrap_or_else(|e| e.into_inner()).take();
    }

    pub(super) async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        let socket = self.socket()?;
        socket.recv(buf).await
    }

    /// Sends one datagram. ICMP errors echoed from earlier sends are logged
    /// and swallowed.
    async fn send_datagram(&self, datagram: &[u8]) -> io::Result<()> {
        let socket = self.socket()?;
        match socket.send(datagram).await {
            Ok(_) => Ok(()),
            Err(e) if is_transient(&e) => {
                tracing::debug!(peer = %self.peer, error = %e, "transient send error");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Frames, sequences and sends `payload` without waiting for an ACK.
    pub(super) async fn send_packet(
        &self,
        payload: Bytes,
        reliability: Reliability,
    ) -> Result<(), RaknetError> {
        let datagrams = self.session().queue_packet(payload, reliability)?;
        for datagram in datagrams {
            self.send_datagram(&datagram).await?;
        }
        Ok(())
    }

    /// Best-effort goodbye; errors are only logged.
    pub(super) async fn send_disconnect(&self) {
        if let Err(e) = self
            .send_packet(DisconnectionNotification.encode(), Reliability::Reliable)
            .await
        {
            tracing::debug!(peer = %self.peer, error = %e, "failed to send disconnection notification");
        }
    }

    /// Handles one received datagram and flushes the resulting ACKs and NACKs.
    ///
    /// Returns the `ConnectionRequestAccepted` if the datagram carried one;
    /// every other message is handled here.
    pub(super) async fn process_datagram(
        &self,
        datagram: Bytes,
    ) -> Result<Option<ConnectionRequestAccepted>, RaknetError> {
        let incoming = self.session().handle_datagram(datagram)?;

        let mut accepted = None;
        match incoming {
            Incoming::Acknowledged(AckKind::Ack, count) => {
                tracing::trace!(peer = %self.peer, count, "ack");
            }
            Incoming::Acknowledged(AckKind::Nack, _) => self.resend().await?,
            Incoming::Messages(messages) => {
                for message in messages {
                    if !self.is_open() {
                        break;
                    }
                    match self.dispatch(message).await {
                        Ok(Some(msg)) => accepted = Some(msg),
                        Ok(None) => {}
                        Err(RaknetError::Decode(e)) => {
                            tracing::debug!(peer = %self.peer, error = %e, "dropping malformed message");
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        self.flush_acks().await?;
        Ok(accepted)
    }

    async fn dispatch(
        &self,
        message: Bytes,
    ) -> Result<Option<ConnectionRequestAccepted>, RaknetError> {
        if message.is_empty() {
            return Ok(None);
        }

        match RaknetPacket::decode(&mut message.clone())? {
            RaknetPacket::DisconnectionNotification(_) => {
                tracing::info!(peer = %self.peer, "peer disconnected");
                self.shutdown();
            }
            RaknetPacket::ConnectedPing(ping) => {
                let pong = ConnectedPong {
                    ping_timestamp: ping.timestamp,
                    pong_timestamp: RaknetTime::now(),
                };
                self.send_packet(pong.encode(), Reliability::Reliable).await?;
            }
            RaknetPacket::ConnectedPong(pong) => {
                let rtt = RaknetTime::now().0.saturating_sub(pong.ping_timestamp.0);
                tracing::trace!(peer = %self.peer, rtt_ms = rtt, "connected pong");
            }
            RaknetPacket::ConnectionRequestAccepted(accepted) => return Ok(Some(accepted)),
            packet => {
                tracing::trace!(peer = %self.peer, id = format_args!("0x{:02x}", packet.id()), "inbound message");
                if self.inbound.send(message).is_err() {
                    tracing::debug!(peer = %self.peer, "inbound queue closed, dropping message");
                }
            }
        }
        Ok(None)
    }

    /// Re-sends every NACKed datagram with its original bytes and sequence
    /// number.
    async fn resend(&self) -> io::Result<()> {
        if !self.is_open() {
            return Ok(());
        }
        let due = self.session().resend_due();
        for (sequence, datagram) in due {
            tracing::debug!(peer = %self.peer, seq = sequence.value(), "resending datagram");
            self.send_datagram(&datagram).await?;
            self.session().mark_resent(sequence);
        }
        Ok(())
    }

    async fn flush_acks(&self) -> io::Result<()> {
        if !self.is_open() {
            return Ok(());
        }
        let (acks, nacks) = {
            let mut session = self.session();
            (session.take_ack_datagrams(), session.take_nack_datagrams())
        };
        for datagram in acks.iter().chain(nacks.iter()) {
            self.send_datagram(datagram).await?;
        }
        Ok(())
    }
}

/// Reads datagrams until cancelled, the peer disconnects, or the socket
/// fails.
pub(super) async fn run_receive_loop(conn: Arc<Connection>) {
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];

    loop {
        let len = tokio::select! {
            biased;
            _ = conn.cancel.cancelled() => break,
            res = conn.recv(&mut buf) => match res {
                Ok(len) => len,
                Err(e) if is_transient(&e) => {
                    tracing::debug!(peer = %conn.peer, error = %e, "transient socket error");
                    continue;
                }
                Err(e) => {
                    tracing::error!(peer = %conn.peer, error = %e, "socket receive failed");
                    conn.shutdown();
                    break;
                }
            }
        };

        match conn
            .process_datagram(Bytes::copy_from_slice(&buf[..len]))
            .await
        {
            Ok(Some(_)) => {
                tracing::debug!(peer = %conn.peer, "ignoring repeated connection request accepted");
            }
            Ok(None) => {}
            Err(RaknetError::Decode(e)) => {
                tracing::debug!(peer = %conn.peer, error = %e, len, "dropping malformed datagram");
            }
            Err(e) => {
                tracing::error!(peer = %conn.peer, error = %e, "closing session");
                conn.shutdown();
                break;
            }
        }
    }

    tracing::debug!(peer = %conn.peer, "receive loop stopped");
}

/// Sends a reliable `ConnectedPing` every `interval` until cancelled.
pub(super) async fn run_keepalive(conn: Arc<Connection>, interval: Duration) {
    let mut tick = time::interval(interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = conn.cancel.cancelled() => break,
            _ = tick.tick() => {
                let ping = ConnectedPing { timestamp: RaknetTime::now() };
                match conn.send_packet(ping.encode(), Reliability::Reliable).await {
                    Ok(()) => {}
                    Err(e) => {
                        tracing::error!(peer = %conn.peer, error = %e, "keep-alive failed, closing session");
                        conn.shutdown();
                        break;
                    }
                }
            }
        }
    }

    tracing::debug!(peer = %conn.peer, "keep-alive stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn connection_to(peer: SocketAddr) -> (Connection, mpsc::UnboundedReceiver<Bytes>) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        socket.connect(peer).await.unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(Mutex::new(ConnectionState::Connected));
        (Connection::new(socket, peer, 1, 1492, state, tx), rx)
    }

    #[tokio::test]
    async fn refused_sends_keep_the_session_open() {
        // Nothing listens here once the placeholder is dropped.
        let closed = std::net::UdpSocket::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let (conn, _rx) = connection_to(closed).await;

        for _ in 0..3 {
            conn.send_packet(Bytes::from_static(b"\xfeping"), Reliability::Reliable)
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        conn.flush_acks().await.unwrap();
        assert!(conn.is_open());
    }

    #[tokio::test]
    async fn shutdown_releases_the_socket() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let (conn, _rx) = connection_to(peer.local_addr().unwrap()).await;
        let local = conn.local_addr().unwrap();

        conn.shutdown();
        assert!(!conn.is_open());
        assert!(conn.local_addr().is_err());
        std::net::UdpSocket::bind(local).unwrap();
        assert!(matches!(
            conn.send_packet(Bytes::from_static(b"\xfelate"), Reliability::Reliable)
                .await,
            Err(RaknetError::Io(_))
        ));
    }

    #[tokio::test]
    async fn control_messages_stay_in_the_session() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let (conn, mut rx) = connection_to(peer.local_addr().unwrap()).await;

        let pong = ConnectedPong {
            ping_timestamp: RaknetTime(1),
            pong_timestamp: RaknetTime(2),
        };
        assert!(conn.dispatch(pong.encode()).await.unwrap().is_none());
        assert!(conn.dispatch(Bytes::from_static(b"\xfegame")).await.unwrap().is_none());
        assert_eq!(rx.try_recv().unwrap(), Bytes::from_static(b"\xfegame"));
        assert!(rx.try_recv().is_err());

        assert!(conn.dispatch(DisconnectionNotification.encode()).await.unwrap().is_none());
        assert!(!conn.is_open());
    }
}
