//! Unconnected (offline) RakNet discovery and ping packets.

use bytes::{Buf, BufMut, Bytes};

use crate::protocol::{
    packet::{DecodeError, Packet, RaknetEncodable},
    types::{RaknetTime, ShortBytes, decode_magic, encode_magic},
};

/// Unconnected ping used by clients to discover RakNet servers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnconnectedPing {
    pub ping_time: RaknetTime,
    pub client_guid: u64,
}

impl Packet for UnconnectedPing {
    const ID: u8 = 0x01;

    fn encode_body(&self, dst: &mut impl BufMut) {
        self.ping_time.encode_raknet(dst);
        self.client_guid.encode_raknet(dst);
        encode_magic(dst);
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        let ping_time = RaknetTime::decode_raknet(src)?;
        let client_guid = u64::decode_raknet(src)?;
        decode_magic(src)?;
        Ok(Self {
            ping_time,
            client_guid,
        })
    }
}

/// Unconnected pong sent by servers in response to `UnconnectedPing`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnconnectedPong {
    pub ping_time: RaknetTime,
    pub server_guid: u64,
    /// Server advertisement, framed by a `u16` length on the wire.
    pub data: Bytes,
}

impl Packet for UnconnectedPong {
    const ID: u8 = 0x1c;

    fn encode_body(&self, dst: &mut impl BufMut) {
        self.ping_time.encode_raknet(dst);
        self.server_guid.encode_raknet(dst);
        encode_magic(dst);
        ShortBytes(self.data.clone()).encode_raknet(dst);
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        let ping_time = RaknetTime::decode_raknet(src)?;
        let server_guid = u64::decode_raknet(src)?;
        decode_magic(src)?;
        Ok(Self {
            ping_time,
            server_guid,
            data: ShortBytes::decode_raknet(src)?.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconnected_ping_roundtrip() {
        let pkt = UnconnectedPing {
            ping_time: RaknetTime(123),
            client_guid: 0xDEAD_BEEF,
        };
        let mut slice = pkt.encode();
        assert_eq!(slice.len(), 1 + 8 + 8 + 16);
        let decoded = UnconnectedPing::decode(&mut slice).unwrap();
        assert_eq!(decoded, pkt);
    }

    #[test]
    fn unconnected_pong_roundtrip() {
        let pkt = UnconnectedPong {
            ping_time: RaknetTime(1),
            server_guid: 2,
            data: Bytes::from_static(b"MCPE;Dedicated Server;527"),
        };
        let mut slice = pkt.encode();
        let decoded = UnconnectedPong::decode(&mut slice).unwrap();
        assert_eq!(decoded, pkt);
    }

    #[test]
    fn pong_with_tampered_magic_fails() {
        let pkt = UnconnectedPong {
            ping_time: RaknetTime(1),
            server_guid: 2,
            data: Bytes::new(),
        };
        let mut raw = pkt.encode().to_vec();
        // ID + ping time + guid precede the magic.
        raw[1 + 8 + 8 + 3] ^= 0xFF;
        let mut slice = &raw[..];
        assert!(matches!(
            UnconnectedPong::decode(&mut slice),
            Err(DecodeError::InvalidMagic)
        ));
    }

    #[test]
    fn wrong_id_is_rejected() {
        let pkt = UnconnectedPing {
            ping_time: RaknetTime(5),
            client_guid: 6,
        };
        let mut slice = pkt.encode();
        assert!(matches!(
            UnconnectedPong::decode(&mut slice),
            Err(DecodeError::UnexpectedId { expected: 0x1c, found: 0x01 })
        ));
    }
}
