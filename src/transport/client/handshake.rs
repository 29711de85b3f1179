//! MTU discovery and the three handshake steps.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::time::{Instant, timeout_at};

use crate::RaknetError;
use crate::protocol::{
    constants::{MAXIMUM_MTU_SIZE, MINIMUM_MTU_SIZE, RECV_BUFFER_SIZE, SYSTEM_ADDRESS_COUNT},
    packet::{
        ConnectionRequest, ConnectionRequestAccepted, NewIncomingConnection, OpenConnectionReply1,
        OpenConnectionReply2, OpenConnectionRequest1, OpenConnectionRequest2, Packet,
    },
    reliability::Reliability,
    types::RaknetTime,
};

use super::connection::Connection;

/// Binary search for the largest MTU in `[min, max]` that `probe` accepts.
///
/// An accepted probe raises the floor, a rejected one lowers the ceiling.
/// Returns `None` when even `min` is rejected.
pub(super) async fn detect_mtu<F, Fut>(min: u16, max: u16, mut probe: F) -> Option<u16>
where
    F: FnMut(u16) -> Fut,
    Fut: Future<Output = bool>,
{
    let mut low = i32::from(min);
    let mut high = i32::from(max);

    while low <= high {
        let mid = low + (high - low) / 2;
        if probe(mid as u16).await {
            low = mid + 1;
        } else {
            high = mid - 1;
        }
    }

    (high >= i32::from(min)).then_some(high as u16)
}

/// Sends an `OpenConnectionRequest1` padded to `mtu` and waits for the
/// `OpenConnectionReply1` echoing that size. Late replies to earlier probes
/// are skipped.
pub(super) async fn probe_mtu(socket: &UdpSocket, mtu: u16, wait: Duration) -> bool {
    tracing::debug!(mtu, "probing mtu");

    let request = OpenConnectionRequest1::new(mtu);
    if let Err(e) = socket.send(&request.encode()).await {
        tracing::debug!(mtu, error = %e, "failed to send open connection request 1");
        return false;
    }

    let echoed = |reply: &OpenConnectionReply1| reply.mtu == mtu;
    match recv_matching(socket, wait, "open connection reply 1", echoed).await {
        Ok(reply) => {
            tracing::debug!(mtu, server_guid = reply.server_guid, "mtu accepted");
            true
        }
        Err(e) => {
            tracing::debug!(mtu, error = %e, "mtu rejected");
            false
        }
    }
}

/// Step 1: announces the chosen MTU and learns the server GUID.
pub(super) async fn open_connection(
    socket: &UdpSocket,
    remote: SocketAddr,
    mtu: u16,
    client_guid: u64,
    wait: Duration,
) -> Result<OpenConnectionReply2, RaknetError> {
    let request = OpenConnectionRequest2 {
        server_address: Some(remote),
        mtu,
        client_guid,
    };
    socket.send(&request.encode()).await?;

    let mut reply = recv_packet::<OpenConnectionReply2>(socket, wait, "open connection reply 2").await?;
    reply.mtu = reply.mtu.clamp(MINIMUM_MTU_SIZE, MAXIMUM_MTU_SIZE);
    tracing::debug!(mtu = reply.mtu, server_guid = reply.server_guid, "open connection reply 2");
    Ok(reply)
}

/// Step 2: sends a reliable `ConnectionRequest` and feeds every datagram
/// through the session until `ConnectionRequestAccepted` shows up.
pub(super) async fn request_connection(
    conn: &Connection,
    client_guid: u64,
    wait: Duration,
) -> Result<ConnectionRequestAccepted, RaknetError> {
    let request = ConnectionRequest {
        client_guid,
        timestamp: RaknetTime::now(),
        use_security: false,
    };
    conn.send_packet(request.encode(), Reliability::Reliable)
        .await?;

    let deadline = Instant::now() + wait;
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];
    loop {
        let len = timeout_at(deadline, conn.recv(&mut buf))
            .await
            .map_err(|_| RaknetError::Timeout("connection request accepted"))??;

        match conn.process_datagram(Bytes::copy_from_slice(&buf[..len])).await {
            Ok(Some(accepted)) => return Ok(accepted),
            Ok(None) => {}
            Err(RaknetError::Decode(e)) => {
                tracing::debug!(error = %e, "ignoring datagram while waiting for acceptance");
            }
            Err(e) => return Err(e),
        }

        if !conn.is_open() {
            return Err(RaknetError::ConnectionClosed);
        }
    }
}

/// Step 3: sends `NewIncomingConnection`. Nothing is awaited.
pub(super) async fn announce(
    conn: &Connection,
    accepted: &ConnectionRequestAccepted,
) -> Result<(), RaknetError> {
    let announce = NewIncomingConnection {
        server_address: Some(conn.peer()),
        system_addresses: [None; SYSTEM_ADDRESS_COUNT],
        timestamp: RaknetTime::now(),
        server_timestamp: accepted.server_timestamp,
    };
    conn.send_packet(announce.encode(), Reliability::Reliable)
        .await
}

/// Waits for a `T` from the connected peer, skipping anything else.
pub(super) async fn recv_packet<T: Packet>(
    socket: &UdpSocket,
    wait: Duration,
    what: &'static str,
) -> Result<T, RaknetError> {
    recv_matching(socket, wait, what, |_: &T| true).await
}

/// Like `recv_packet`, but also skips any `T` that `accept` rejects.
async fn recv_matching<T: Packet>(
    socket: &UdpSocket,
    wait: Duration,
    what: &'static str,
    accept: impl Fn(&T) -> bool,
) -> Result<T, RaknetError> {
    let deadline = Instant::now() + wait;
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];
    loop {
        let len = timeout_at(deadline, socket.recv(&mut buf))
            .await
            .map_err(|_| RaknetError::Timeout(what))??;

        let mut slice = &buf[..len];
        match T::decode(&mut slice) {
            Ok(packet) if accept(&packet) => return Ok(packet),
            Ok(_) => tracing::trace!(len, "skipping stale {what}"),
            Err(e) => tracing::trace!(len, error = %e, "skipping packet while waiting for {what}"),
        }
    }
}
