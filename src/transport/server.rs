use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::RaknetError;
use crate::protocol::{
    constants::RECV_BUFFER_SIZE,
    packet::{Packet, RaknetPacket, UnconnectedPong},
};
use crate::transport::is_transient;

pub const DEFAULT_PORT: u16 = 19132;

/// Configuration for [`RaknetServer`].
#[derive(Debug, Clone)]
pub struct RaknetServerConfig {
    pub bind_addr: SocketAddr,
    /// Server GUID; random when unset.
    pub guid: Option<u64>,
    /// Initial data carried in every `UnconnectedPong`.
    pub pong_data: Bytes,
}

impl Default for RaknetServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            guid: None,
            pong_data: Bytes::new(),
        }
    }
}

impl RaknetServerConfig {
    pub fn builder() -> RaknetServerConfigBuilder {
        RaknetServerConfigBuilder::default()
    }
}

/// Builder for [`RaknetServerConfig`].
#[derive(Debug, Clone, Default)]
pub struct RaknetServerConfigBuilder {
    config: RaknetServerConfig,
}

impl RaknetServerConfigBuilder {
    pub fn bind_addr(mut self, addr: impl Into<SocketAddr>) -> Self {
        self.config.bind_addr = addr.into();
        self
    }

    pub fn guid(mut self, guid: u64) -> Self {
        self.config.guid = Some(guid);
        self
    }

    pub fn pong_data(mut self, data: impl Into<Bytes>) -> Self {
        self.config.pong_data = data.into();
        self
    }

    pub fn build(self) -> RaknetServerConfig {
        self.config
    }
}

/// Answers `UnconnectedPing` with `UnconnectedPong`. Every other offline
/// message is logged and ignored; this server accepts no connections.
///
/// The responder stops on a socket error other than an ICMP echo;
/// `is_running` then reports `false` and `start` may be called again.
pub struct RaknetServer {
    bind_addr: SocketAddr,
    guid: u64,
    pong_data: Arc<RwLock<Bytes>>,
    local_addr: Option<SocketAddr>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl RaknetServer {
    pub fn new(config: RaknetServerConfig) -> Self {
        Self {
            bind_addr: config.bind_addr,
            guid: config.guid.unwrap_or_else(rand::random),
            pong_data: Arc::new(RwLock::new(config.pong_data)),
            local_addr: None,
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    /// Binds the socket and spawns the responder task.
    pub async fn start(&mut self) -> Result<SocketAddr, RaknetError> {
        if self.is_running() {
            return Err(RaknetError::AlreadyRunning);
        }

        let socket = UdpSocket::bind(self.bind_addr).await?;
        let local_addr = socket.local_addr()?;
        self.cancel = CancellationToken::new();
        self.local_addr = Some(local_addr);
        self.task = Some(tokio::spawn(run_responder(
            socket,
            self.guid,
            self.pong_data.clone(),
            self.cancel.clone(),
        )));

        tracing::info!(addr = %local_addr, guid = self.guid, "server started");
        Ok(local_addr)
    }

    /// Stops the responder task and releases the socket.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::debug!(error = %e, "responder task ended abnormally");
            }
            tracing::info!(addr = ?self.local_addr, "server stopped");
        }
        self.local_addr = None;
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Address the socket is bound to while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn guid(&self) -> u64 {
        self.guid
    }

    /// Replaces the pong data; takes effect for the next ping.
    pub fn set_pong_data(&self, data: impl Into<Bytes>) {
        let mut guard = self.pong_data.write().unwrap_or_else(|e| e.into_inner());
        *guard = data.into();
    }

    pub fn pong_data(&self) -> Bytes {
        self.pong_data
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Drop for RaknetServer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_responder(
    socket: UdpSocket,
    guid: u64,
    pong_data: Arc<RwLock<Bytes>>,
    cancel: CancellationToken,
) {
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];

    loop {
        let (len, peer) = tokio::select! {
            _ = cancel.cancelled() => break,
            res = socket.recv_from(&mut buf) => match res {
                Ok(v) => v,
                Err(e) if is_transient(&e) => continue,
                Err(e) => {
                    tracing::error!(error = %e, "socket receive failed, stopping responder");
                    break;
                }
            }
        };

        let mut slice = &buf[..len];
        let ping = match RaknetPacket::decode(&mut slice) {
            Ok(RaknetPacket::UnconnectedPing(ping)) => ping,
            Ok(other) => {
                tracing::debug!(peer = %peer, id = format_args!("0x{:02x}", other.id()), "ignoring offline message");
                continue;
            }
            Err(e) => {
                tracing::debug!(peer = %peer, len, error = %e, "malformed offline message");
                continue;
            }
        };

        let pong = UnconnectedPong {
            ping_time: ping.ping_time,
            server_guid: guid,
            data: pong_data.read().unwrap_or_else(|e| e.into_inner()).clone(),
        };
        if let Err(e) = socket.send_to(&pong.encode(), peer).await {
            tracing::debug!(peer = %peer, error = %e, "failed to send pong");
        }
        tracing::trace!(peer = %peer, client_guid = ping.client_guid, "pong sent");
    }

    tracing::debug!("responder stopped");
}
