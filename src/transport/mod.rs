//! Tokio-based UDP transport.
//!
//! - `RaknetClient` drives MTU discovery, the handshake and the connected
//!   session's receive and keep-alive tasks.
//! - `RaknetServer` answers unconnected pings.
//!
//! Framing, sequencing and ACK/NACK bookkeeping live in `session`; this
//! module only moves their output over sockets.

use std::io;

use bytes::Bytes;

use crate::protocol::reliability::Reliability;

pub mod client;
pub mod datagram;
pub mod encapsulated_packet;
pub mod server;

pub use client::{RaknetClient, RaknetClientConfig, RaknetClientConfigBuilder};
pub use server::{RaknetServer, RaknetServerConfig, RaknetServerConfigBuilder};

/// High-level message object for sending data.
/// Wraps the payload and its reliability tier.
#[derive(Debug, Clone)]
pub struct Message {
    pub buffer: Bytes,
    pub reliability: Reliability,
}

impl Message {
    pub fn new(buffer: impl Into<Bytes>) -> Self {
        Self {
            buffer: buffer.into(),
            reliability: Reliability::ReliableOrdered,
        }
    }

    pub fn reliability(mut self, reliability: Reliability) -> Self {
        self.reliability = reliability;
        self
    }
}

impl From<Bytes> for Message {
    fn from(buffer: Bytes) -> Self {
        Self::new(buffer)
    }
}

impl From<Vec<u8>> for Message {
    fn from(vec: Vec<u8>) -> Self {
        Self::new(vec)
    }
}

impl From<&'static [u8]> for Message {
    fn from(slice: &'static [u8]) -> Self {
        Self::new(Bytes::from(slice))
    }
}

impl From<&str> for Message {
    fn from(s: &str) -> Self {
        Self::new(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for Message {
    fn from(s: String) -> Self {
        Self::new(Bytes::from(s))
    }
}

/// ICMP unreachable from an earlier send surfaces on the next syscall of a
/// UDP socket, send or recv alike.
pub(crate) fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionRefused
    )
}
