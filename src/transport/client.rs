mod connection;
mod handshake;

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::RaknetError;
use crate::protocol::{
    constants::{
        CONNECTION_REQUEST_TIMEOUT, CONNECTION_TIMEOUT, KEEPALIVE_INTERVAL, MAXIMUM_MTU_SIZE,
        MINIMUM_MTU_SIZE, MTU_PROBE_TIMEOUT, OPEN_CONNECTION_TIMEOUT, PING_TIMEOUT,
        RECV_BUFFER_SIZE,
    },
    packet::{Packet, UnconnectedPing, UnconnectedPong},
    state::{ConnectionState, HandshakeStep},
    types::RaknetTime,
};

use connection::{Connection, run_keepalive, run_receive_loop};

/// Configuration for [`RaknetClient`].
#[derive(Debug, Clone)]
pub struct RaknetClientConfig {
    /// Lower bound of the MTU search.
    pub min_mtu: u16,
    /// Upper bound of the MTU search.
    pub max_mtu: u16,
    /// Wait per `OpenConnectionRequest1` probe.
    pub mtu_probe_timeout: Duration,
    /// Wait for `OpenConnectionReply2`.
    pub open_connection_timeout: Duration,
    /// Wait for `ConnectionRequestAccepted`.
    pub connection_request_timeout: Duration,
    /// Bound on the whole of `connect`.
    pub connection_timeout: Duration,
    /// Wait for an `UnconnectedPong`.
    pub ping_timeout: Duration,
    /// Period of connected pings.
    pub keepalive_interval: Duration,
    /// Client GUID; random when unset.
    pub guid: Option<u64>,
}

impl Default for RaknetClientConfig {
    fn default() -> Self {
        Self {
            min_mtu: MINIMUM_MTU_SIZE,
            max_mtu: MAXIMUM_MTU_SIZE,
            mtu_probe_timeout: MTU_PROBE_TIMEOUT,
            open_connection_timeout: OPEN_CONNECTION_TIMEOUT,
            connection_request_timeout: CONNECTION_REQUEST_TIMEOUT,
            connection_timeout: CONNECTION_TIMEOUT,
            ping_timeout: PING_TIMEOUT,
            keepalive_interval: KEEPALIVE_INTERVAL,
            guid: None,
        }
    }
}

impl From<RaknetClientConfigBuilder> for RaknetClientConfig {
    fn from(builder: RaknetClientConfigBuilder) -> Self {
        builder.build()
    }
}

impl RaknetClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> RaknetClientConfigBuilder {
        RaknetClientConfigBuilder::default()
    }
}

/// Builder for [`RaknetClientConfig`].
#[derive(Debug, Clone, Default)]
pub struct RaknetClientConfigBuilder {
    config: RaknetClientConfig,
}

impl RaknetClientConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds of the MTU search. Values outside `[576, 1492]` are clamped.
    pub fn mtu_range(mut self, min: u16, max: u16) -> Self {
        self.config.min_mtu = min.clamp(MINIMUM_MTU_SIZE, MAXIMUM_MTU_SIZE);
        self.config.max_mtu = max.clamp(self.config.min_mtu, MAXIMUM_MTU_SIZE);
        self
    }

    pub fn mtu_probe_timeout(mut self, timeout: Duration) -> Self {
        self.config.mtu_probe_timeout = timeout;
        self
    }

    pub fn open_connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.open_connection_timeout = timeout;
        self
    }

    pub fn connection_request_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection_request_timeout = timeout;
        self
    }

    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection_timeout = timeout;
        self
    }

    pub fn ping_timeout(mut self, timeout: Duration) -> Self {
        self.config.ping_timeout = timeout;
        self
    }

    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.config.keepalive_interval = interval;
        self
    }

    pub fn guid(mut self, guid: u64) -> Self {
        self.config.guid = Some(guid);
        self
    }

    pub fn build(self) -> RaknetClientConfig {
        self.config
    }
}

/// A RakNet client connection.
///
/// `connect` runs MTU discovery and the handshake, then spawns a receive
/// task and a keep-alive task that live until `close`, a peer
/// `DisconnectionNotification`, or a socket failure.
pub struct RaknetClient {
    config: RaknetClientConfig,
    guid: u64,
    state: Arc<Mutex<ConnectionState>>,
    connection: Option<Arc<Connection>>,
    incoming: Option<mpsc::UnboundedReceiver<Bytes>>,
    tasks: Vec<JoinHandle<()>>,
}

impl Default for RaknetClient {
    fn default() -> Self {
        Self::new(RaknetClientConfig::default())
    }
}

impl RaknetClient {
    pub fn new(config: RaknetClientConfig) -> Self {
        let guid = config.guid.unwrap_or_else(rand::random);
        Self {
            config,
            guid,
            state: Arc::new(Mutex::new(ConnectionState::Disconnected)),
            connection: None,
            incoming: None,
            tasks: Vec::new(),
        }
    }

    pub fn guid(&self) -> u64 {
        self.guid
    }

    pub fn config(&self) -> &RaknetClientConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: ConnectionState) {
        tracing::trace!(%state, "state change");
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// The current session, unless it has been shut down.
    fn live(&self) -> Option<&Arc<Connection>> {
        self.connection.as_ref().filter(|c| c.is_open())
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected() && self.live().is_some()
    }

    /// Negotiated MTU of the current session.
    pub fn mtu(&self) -> Option<u16> {
        self.live().map(|c| c.mtu())
    }

    pub fn server_guid(&self) -> Option<u64> {
        self.live().map(|c| c.server_guid())
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.live().map(|c| c.peer())
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.live().and_then(|c| c.local_addr().ok())
    }

    /// Sends an `UnconnectedPing` from `local` to `remote` and returns the
    /// pong data, waiting at most the configured ping timeout.
    pub async fn ping(&self, local: SocketAddr, remote: SocketAddr) -> Result<Bytes, RaknetError> {
        self.ping_with_timeout(local, remote, self.config.ping_timeout)
            .await
    }

    pub async fn ping_with_timeout(
        &self,
        local: SocketAddr,
        remote: SocketAddr,
        timeout: Duration,
    ) -> Result<Bytes, RaknetError> {
        let socket = UdpSocket::bind(local).await?;
        socket.connect(remote).await?;

        let ping = UnconnectedPing {
            ping_time: RaknetTime::now(),
            client_guid: self.guid,
        };
        socket.send(&ping.encode()).await?;

        let pong = tokio::time::timeout(timeout, recv_pong(&socket))
            .await
            .map_err(|_| RaknetError::Timeout("unconnected pong"))??;
        tracing::debug!(peer = %remote, server_guid = pong.server_guid, len = pong.data.len(), "pong");
        Ok(pong.data)
    }

    /// Connects from `local` to `remote` within the configured connection
    /// timeout. Returns immediately when already connected.
    pub async fn connect(&mut self, local: SocketAddr, remote: SocketAddr) -> Result<(), RaknetError> {
        let timeout = self.config.connection_timeout;
        self.connect_with_timeout(local, remote, timeout).await
    }

    #[tracing::instrument(skip(self), fields(guid = self.guid), level = "debug")]
    pub async fn connect_with_timeout(
        &mut self,
        local: SocketAddr,
        remote: SocketAddr,
        timeout: Duration,
    ) -> Result<(), RaknetError> {
        if self.is_connected() {
            return Ok(());
        }
        self.close().await;

        let established = tokio::time::timeout(timeout, self.establish(local, remote))
            .await
            .unwrap_or(Err(RaknetError::Timeout("connection")));

        let (conn, incoming) = match established {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!(peer = %remote, error = %e, "connect failed");
                self.set_state(ConnectionState::Disconnected);
                return Err(e);
            }
        };

        self.set_state(ConnectionState::Connected);
        self.tasks = vec![
            tokio::spawn(run_receive_loop(conn.clone())),
            tokio::spawn(run_keepalive(conn.clone(), self.config.keepalive_interval)),
        ];
        tracing::info!(peer = %remote, mtu = conn.mtu(), server_guid = conn.server_guid(), "connected");

        self.connection = Some(conn);
        self.incoming = Some(incoming);
        Ok(())
    }

    async fn establish(
        &self,
        local: SocketAddr,
        remote: SocketAddr,
    ) -> Result<(Arc<Connection>, mpsc::UnboundedReceiver<Bytes>), RaknetError> {
        let socket = UdpSocket::bind(local).await?;
        socket.connect(remote).await?;

        self.set_state(ConnectionState::MtuDetecting);
        let probe_timeout = self.config.mtu_probe_timeout;
        let probe_socket = &socket;
        let mtu = handshake::detect_mtu(self.config.min_mtu, self.config.max_mtu, move |mtu| {
            handshake::probe_mtu(probe_socket, mtu, probe_timeout)
        })
        .await
        .ok_or(RaknetError::MtuDetectionFailed)?;
        tracing::debug!(mtu, "mtu detected");

        self.set_state(ConnectionState::Handshaking(HandshakeStep::OpenConnection));
        let reply = handshake::open_connection(
            &socket,
            remote,
            mtu,
            self.guid,
            self.config.open_connection_timeout,
        )
        .await?;

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let conn = Arc::new(Connection::new(
            socket,
            remote,
            reply.server_guid,
            reply.mtu,
            self.state.clone(),
            inbound_tx,
        ));

        self.set_state(ConnectionState::Handshaking(HandshakeStep::ConnectionRequest));
        let accepted = handshake::request_connection(
            &conn,
            self.guid,
            self.config.connection_request_timeout,
        )
        .await?;
        tracing::debug!(client_address = ?accepted.client_address, "connection request accepted");

        self.set_state(ConnectionState::Handshaking(HandshakeStep::NewIncomingConnection));
        handshake::announce(&conn, &accepted).await?;

        Ok((conn, inbound_rx))
    }

    /// Sends `msg` to the server. Empty payloads are ignored.
    pub async fn send(&self, msg: impl Into<super::Message>) -> Result<(), RaknetError> {
        let msg = msg.into();
        let conn = match self.live() {
            Some(conn) if self.state().is_connected() => conn,
            _ => return Err(RaknetError::NotConnected),
        };
        if msg.buffer.is_empty() {
            return Ok(());
        }
        conn.send_packet(msg.buffer, msg.reliability).await
    }

    /// Next reassembled payload from the server, waiting at most `timeout`.
    /// `Duration::ZERO` only polls what has already arrived.
    ///
    /// Payloads received before a disconnect can still be drained.
    pub async fn receive(&mut self, timeout: Duration) -> Option<Bytes> {
        let incoming = self.incoming.as_mut()?;
        if let Ok(payload) = incoming.try_recv() {
            return Some(payload);
        }
        if timeout.is_zero() {
            return None;
        }
        tokio::time::timeout(timeout, incoming.recv())
            .await
            .ok()
            .flatten()
    }

    /// Sends a best-effort `DisconnectionNotification` when connected, then
    /// stops the background tasks and releases the socket.
    pub async fn close(&mut self) {
        if let Some(conn) = self.connection.take() {
            if self.state().is_connected() && conn.is_open() {
                conn.send_disconnect().await;
            }
            conn.shutdown();
            tracing::info!(peer = %conn.peer(), "connection closed");
        }

        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                tracing::debug!(error = %e, "session task ended abnormally");
            }
        }
        self.incoming = None;
        self.set_state(ConnectionState::Disconnected);
    }
}

impl Drop for RaknetClient {
    fn drop(&mut self) {
        if let Some(conn) = &self.connection {
            conn.shutdown();
        }
    }
}

async fn recv_pong(socket: &UdpSocket) -> Result<UnconnectedPong, RaknetError> {
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];
    loop {
        let len = socket.recv(&mut buf).await?;
        let mut slice = &buf[..len];
        match UnconnectedPong::decode(&mut slice) {
            Ok(pong) => return Ok(pong),
            Err(e) => tracing::debug!(len, error = %e, "ignoring non-pong reply"),
        }
    }
}
