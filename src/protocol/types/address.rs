//! Endpoint addresses as they appear inside handshake messages.
//!
//! IPv4 is `0x04`, four address bytes, big-endian port. A missing address is
//! written as an all-zero IPv4 entry and read back as `None`.
//!
//! IPv6 is a placeholder only: it is written as `0x06` followed by 19 zero
//! bytes and always decodes to `None`.

use bytes::{Buf, BufMut};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use crate::protocol::constants::{IPV4_MESSAGE_SIZE, IPV6_MESSAGE_SIZE};
use crate::protocol::packet::{DecodeError, RaknetEncodable};

const IPV4_VERSION: u8 = 4;
const IPV6_VERSION: u8 = 6;

impl RaknetEncodable for Option<SocketAddr> {
    fn encode_raknet(&self, dst: &mut impl BufMut) {
        match self {
            Some(SocketAddr::V4(addr)) => {
                dst.put_u8(IPV4_VERSION);
                dst.put_slice(&addr.ip().octets());
                dst.put_u16(addr.port());
            }
            Some(SocketAddr::V6(_)) => {
                dst.put_u8(IPV6_VERSION);
                dst.put_bytes(0, IPV6_MESSAGE_SIZE - 1);
            }
            None => {
                dst.put_u8(IPV4_VERSION);
                dst.put_bytes(0, IPV4_MESSAGE_SIZE - 1);
            }
        }
    }

    fn decode_raknet(src: &mut impl Buf) -> Result<Self, DecodeError> {
        if !src.has_remaining() {
            return Err(DecodeError::UnexpectedEof);
        }
        let version = src.get_u8();

        match version {
            IPV4_VERSION => {
                if src.remaining() < IPV4_MESSAGE_SIZE - 1 {
                    return Err(DecodeError::UnexpectedEof);
                }
                let mut ip_bytes = [0u8; 4];
                src.copy_to_slice(&mut ip_bytes);
                let port = src.get_u16();

                let ip = Ipv4Addr::from(ip_bytes);
                if ip.is_unspecified() && port == 0 {
                    return Ok(None);
                }
                Ok(Some(SocketAddr::V4(SocketAddrV4::new(ip, port))))
            }
            IPV6_VERSION => {
                if src.remaining() < IPV6_MESSAGE_SIZE - 1 {
                    return Err(DecodeError::UnexpectedEof);
                }
                src.advance(IPV6_MESSAGE_SIZE - 1);
                Ok(None)
            }
            _ => Err(DecodeError::InvalidAddrVersion(version)),
        }
    }
}
