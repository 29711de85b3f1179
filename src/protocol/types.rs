//! Wire-level value types shared by the packet codecs and the reliability
//! layer.

use crate::protocol::packet::{DecodeError, RaknetEncodable};
use bytes::{Buf, BufMut, Bytes};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod address;
mod datagram_header;
mod primitives;
mod sequence;

pub use datagram_header::DatagramHeader;
pub use primitives::{decode_magic, encode_magic};
pub use sequence::Sequence24;

pub type Magic = [u8; 16];

/// Unsigned 24-bit integer, most significant byte first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct U24(pub u32);

impl RaknetEncodable for U24 {
    fn encode_raknet(&self, dst: &mut impl BufMut) {
        let v = self.0;
        dst.put_u8(((v >> 16) & 0xFF) as u8);
        dst.put_u8(((v >> 8) & 0xFF) as u8);
        dst.put_u8((v & 0xFF) as u8);
    }

    fn decode_raknet(src: &mut impl Buf) -> Result<Self, DecodeError> {
        if src.remaining() < 3 {
            return Err(DecodeError::UnexpectedEof);
        }
        let b0 = src.get_u8() as u32;
        let b1 = src.get_u8() as u32;
        let b2 = src.get_u8() as u32;
        Ok(U24((b0 << 16) | (b1 << 8) | b2))
    }
}

/// Byte array framed by a big-endian `u16` length.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShortBytes(pub Bytes);

impl RaknetEncodable for ShortBytes {
    fn encode_raknet(&self, dst: &mut impl BufMut) {
        let len = self.0.len().min(u16::MAX as usize);
        dst.put_u16(len as u16);
        dst.put_slice(&self.0[..len]);
    }

    fn decode_raknet(src: &mut impl Buf) -> Result<Self, DecodeError> {
        let len = u16::decode_raknet(src)? as usize;
        if src.remaining() < len {
            return Err(DecodeError::UnexpectedEof);
        }
        Ok(ShortBytes(src.copy_to_bytes(len)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RaknetTime(pub u64); // ms on wire

impl RaknetTime {
    /// Milliseconds since the Unix epoch.
    pub fn now() -> Self {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        RaknetTime(since_epoch.as_millis() as u64)
    }
}

impl RaknetEncodable for RaknetTime {
    fn encode_raknet(&self, dst: &mut impl BufMut) {
        self.0.encode_raknet(dst);
    }

    fn decode_raknet(src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(Self(u64::decode_raknet(src)?))
    }
}

/// End of Buffer Padding, adds any length padding till the
/// end of it. So doesn't send any prepadding length or etc.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EoBPadding(pub usize);

impl RaknetEncodable for EoBPadding {
    fn encode_raknet(&self, dst: &mut impl BufMut) {
        dst.put_bytes(0, self.0);
    }

    fn decode_raknet(src: &mut impl Buf) -> Result<Self, DecodeError> {
        let len = src.remaining();
        src.advance(len);
        Ok(EoBPadding(len))
    }
}
