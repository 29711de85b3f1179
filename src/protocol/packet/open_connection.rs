//! Offline handshake packets exchanged before a session exists.
//!
//! Every packet here carries the offline magic, which is validated before
//! any later field is trusted.

use std::net::SocketAddr;

use bytes::{Buf, BufMut};

use crate::protocol::{
    constants::{OPEN_CONNECTION_REQUEST_1_OVERHEAD, RAKNET_PROTOCOL_VERSION},
    packet::{DecodeError, Packet, RaknetEncodable},
    types::{EoBPadding, decode_magic, encode_magic},
};

/// MTU probe. Carries no MTU field: the packet is zero-padded so that the
/// IP datagram is exactly `mtu` bytes, and the receiver infers the MTU from
/// the length it got.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenConnectionRequest1 {
    pub protocol_version: u8,
    pub mtu: u16,
}

impl OpenConnectionRequest1 {
    pub fn new(mtu: u16) -> Self {
        Self {
            protocol_version: RAKNET_PROTOCOL_VERSION,
            mtu,
        }
    }
}

impl Packet for OpenConnectionRequest1 {
    const ID: u8 = 0x05;

    fn encode_body(&self, dst: &mut impl BufMut) {
        encode_magic(dst);
        self.protocol_version.encode_raknet(dst);
        let padding = (self.mtu as usize).saturating_sub(OPEN_CONNECTION_REQUEST_1_OVERHEAD);
        EoBPadding(padding).encode_raknet(dst);
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        decode_magic(src)?;
        let protocol_version = u8::decode_raknet(src)?;
        let padding = EoBPadding::decode_raknet(src)?;
        let mtu = (padding.0 + OPEN_CONNECTION_REQUEST_1_OVERHEAD).min(u16::MAX as usize) as u16;
        Ok(Self {
            protocol_version,
            mtu,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenConnectionReply1 {
    pub server_guid: u64,
    pub server_has_security: bool,
    pub mtu: u16,
}

impl Packet for OpenConnectionReply1 {
    const ID: u8 = 0x06;

    fn encode_body(&self, dst: &mut impl BufMut) {
        encode_magic(dst);
        self.server_guid.encode_raknet(dst);
        self.server_has_security.encode_raknet(dst);
        self.mtu.encode_raknet(dst);
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        decode_magic(src)?;
        Ok(Self {
            server_guid: u64::decode_raknet(src)?,
            server_has_security: bool::decode_raknet(src)?,
            mtu: u16::decode_raknet(src)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenConnectionRequest2 {
    pub server_address: Option<SocketAddr>,
    pub mtu: u16,
    pub client_guid: u64,
}

impl Packet for OpenConnectionRequest2 {
    const ID: u8 = 0x07;

    fn encode_body(&self, dst: &mut impl BufMut) {
        encode_magic(dst);
        self.server_address.encode_raknet(dst);
        self.mtu.encode_raknet(dst);
        self.client_guid.encode_raknet(dst);
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        decode_magic(src)?;
        Ok(Self {
            server_address: Option::<SocketAddr>::decode_raknet(src)?,
            mtu: u16::decode_raknet(src)?,
            client_guid: u64::decode_raknet(src)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenConnectionReply2 {
    pub server_guid: u64,
    pub client_address: Option<SocketAddr>,
    pub mtu: u16,
    pub encryption_enabled: bool,
}

impl Packet for OpenConnectionReply2 {
    const ID: u8 = 0x08;

    fn encode_body(&self, dst: &mut impl BufMut) {
        encode_magic(dst);
        self.server_guid.encode_raknet(dst);
        self.client_address.encode_raknet(dst);
        self.mtu.encode_raknet(dst);
        self.encryption_enabled.encode_raknet(dst);
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        decode_magic(src)?;
        Ok(Self {
            server_guid: u64::decode_raknet(src)?,
            client_address: Option::<SocketAddr>::decode_raknet(src)?,
            mtu: u16::decode_raknet(src)?,
            encryption_enabled: bool::decode_raknet(src)?,
        })
    }
}

/// Sent by a server whose protocol version differs from the client's.
/// Only the codec exists; the handshake never produces or reacts to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncompatibleProtocolVersion {
    pub protocol: u8,
    pub server_guid: u64,
}

impl Packet for IncompatibleProtocolVersion {
    const ID: u8 = 0x19;

    fn encode_body(&self, dst: &mut impl BufMut) {
        self.protocol.encode_raknet(dst);
        encode_magic(dst);
        self.server_guid.encode_raknet(dst);
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        let protocol = u8::decode_raknet(src)?;
        decode_magic(src)?;
        Ok(Self {
            protocol,
            server_guid: u64::decode_raknet(src)?,
        })
    }
}
