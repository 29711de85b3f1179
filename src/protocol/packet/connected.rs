//! Packets that travel inside reliability frames once a session exists.

use std::net::SocketAddr;

use bytes::{Buf, BufMut};

use crate::protocol::{
    constants::SYSTEM_ADDRESS_COUNT,
    packet::{DecodeError, Packet, RaknetEncodable},
    types::RaknetTime,
};

pub type SystemAddresses = [Option<SocketAddr>; SYSTEM_ADDRESS_COUNT];

fn encode_system_addresses(addresses: &SystemAddresses, dst: &mut impl BufMut) {
    for address in addresses {
        address.encode_raknet(dst);
    }
}

fn decode_system_addresses(src: &mut impl Buf) -> Result<SystemAddresses, DecodeError> {
    let mut addresses: SystemAddresses = [None; SYSTEM_ADDRESS_COUNT];
    for addr in &mut addresses {
        *addr = Option::<SocketAddr>::decode_raknet(src)?;
    }
    Ok(addresses)
}

/// Keep-alive sent every second while connected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedPing {
    pub timestamp: RaknetTime,
}

impl Packet for ConnectedPing {
    const ID: u8 = 0x00;

    fn encode_body(&self, dst: &mut impl BufMut) {
        self.timestamp.encode_raknet(dst);
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(Self {
            timestamp: RaknetTime::decode_raknet(src)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedPong {
    pub ping_timestamp: RaknetTime,
    pub pong_timestamp: RaknetTime,
}

impl Packet for ConnectedPong {
    const ID: u8 = 0x03;

    fn encode_body(&self, dst: &mut impl BufMut) {
        self.ping_timestamp.encode_raknet(dst);
        self.pong_timestamp.encode_raknet(dst);
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(Self {
            ping_timestamp: RaknetTime::decode_raknet(src)?,
            pong_timestamp: RaknetTime::decode_raknet(src)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRequest {
    pub client_guid: u64,
    pub timestamp: RaknetTime,
    pub use_security: bool,
}

impl Packet for ConnectionRequest {
    const ID: u8 = 0x09;

    fn encode_body(&self, dst: &mut impl BufMut) {
        self.client_guid.encode_raknet(dst);
        self.timestamp.encode_raknet(dst);
        self.use_security.encode_raknet(dst);
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(Self {
            client_guid: u64::decode_raknet(src)?,
            timestamp: RaknetTime::decode_raknet(src)?,
            use_security: bool::decode_raknet(src)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRequestAccepted {
    pub client_address: Option<SocketAddr>,
    pub system_index: u16,
    pub system_addresses: SystemAddresses,
    pub incoming_timestamp: RaknetTime,
    pub server_timestamp: RaknetTime,
}

impl Packet for ConnectionRequestAccepted {
    const ID: u8 = 0x10;

    fn encode_body(&self, dst: &mut impl BufMut) {
        self.client_address.encode_raknet(dst);
        self.system_index.encode_raknet(dst);
        encode_system_addresses(&self.system_addresses, dst);
        self.incoming_timestamp.encode_raknet(dst);
        self.server_timestamp.encode_raknet(dst);
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(Self {
            client_address: Option::<SocketAddr>::decode_raknet(src)?,
            system_index: u16::decode_raknet(src)?,
            system_addresses: decode_system_addresses(src)?,
            incoming_timestamp: RaknetTime::decode_raknet(src)?,
            server_timestamp: RaknetTime::decode_raknet(src)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIncomingConnection {
    pub server_address: Option<SocketAddr>,
    pub system_addresses: SystemAddresses,
    pub timestamp: RaknetTime,
    pub server_timestamp: RaknetTime,
}

impl Packet for NewIncomingConnection {
    const ID: u8 = 0x13;

    fn encode_body(&self, dst: &mut impl BufMut) {
        self.server_address.encode_raknet(dst);
        encode_system_addresses(&self.system_addresses, dst);
        self.timestamp.encode_raknet(dst);
        self.server_timestamp.encode_raknet(dst);
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(Self {
            server_address: Option::<SocketAddr>::decode_raknet(src)?,
            system_addresses: decode_system_addresses(src)?,
            timestamp: RaknetTime::decode_raknet(src)?,
            server_timestamp: RaknetTime::decode_raknet(src)?,
        })
    }
}

/// Body-less notice that the sender is closing the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisconnectionNotification;

impl Packet for DisconnectionNotification {
    const ID: u8 = 0x15;

    fn encode_body(&self, _dst: &mut impl BufMut) {}

    fn decode_body(_src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connected_ping_pong_roundtrip() {
        let ping = ConnectedPing {
            timestamp: RaknetTime(1_700_000_000_000),
        };
        let mut slice = ping.encode();
        assert_eq!(slice.len(), 9);
        assert_eq!(ConnectedPing::decode(&mut slice).unwrap(), ping);

        let pong = ConnectedPong {
            ping_timestamp: RaknetTime(1),
            pong_timestamp: RaknetTime(2),
        };
        let mut slice = pong.encode();
        assert_eq!(ConnectedPong::decode(&mut slice).unwrap(), pong);
    }

    #[test]
    fn connection_request_roundtrip() {
        let pkt = ConnectionRequest {
            client_guid: u64::MAX,
            timestamp: RaknetTime(55),
            use_security: false,
        };
        let mut slice = pkt.encode();
        assert_eq!(ConnectionRequest::decode(&mut slice).unwrap(), pkt);
    }

    #[test]
    fn accepted_roundtrip_with_system_addresses() {
        let mut system_addresses: SystemAddresses = [None; SYSTEM_ADDRESS_COUNT];
        system_addresses[0] = Some("127.0.0.1:19132".parse().unwrap());
        system_addresses[19] = Some("10.1.2.3:1".parse().unwrap());

        let pkt = ConnectionRequestAccepted {
            client_address: Some("192.168.0.10:40000".parse().unwrap()),
            system_index: 0,
            system_addresses,
            incoming_timestamp: RaknetTime(10),
            server_timestamp: RaknetTime(11),
        };
        let mut slice = pkt.encode();
        assert_eq!(slice.len(), 1 + 7 + 2 + 7 * SYSTEM_ADDRESS_COUNT + 16);
        assert_eq!(ConnectionRequestAccepted::decode(&mut slice).unwrap(), pkt);
    }

    #[test]
    fn new_incoming_connection_roundtrip() {
        let pkt = NewIncomingConnection {
            server_address: Some("8.8.8.8:19132".parse().unwrap()),
            system_addresses: [None; SYSTEM_ADDRESS_COUNT],
            timestamp: RaknetTime(3),
            server_timestamp: RaknetTime(4),
        };
        let mut slice = pkt.encode();
        assert_eq!(NewIncomingConnection::decode(&mut slice).unwrap(), pkt);
    }

    #[test]
    fn truncated_accepted_fails() {
        let pkt = ConnectionRequestAccepted {
            client_address: None,
            system_index: 0,
            system_addresses: [None; SYSTEM_ADDRESS_COUNT],
            incoming_timestamp: RaknetTime(10),
            server_timestamp: RaknetTime(11),
        };
        let raw = pkt.encode();
        let mut slice = &raw[..raw.len() - 1];
        assert!(matches!(
            ConnectionRequestAccepted::decode(&mut slice),
            Err(DecodeError::UnexpectedEof)
        ));
    }

    #[test]
    fn disconnection_notification_is_one_byte() {
        let bytes = DisconnectionNotification.encode();
        assert_eq!(&bytes[..], &[0x15]);
    }
}
