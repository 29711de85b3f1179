//! ACK and NACK datagrams.
//!
//! Layout: one flag byte (`0x40` ACK, `0x20` NACK), a big-endian `u16`
//! count, then `count` 24-bit sequence numbers. Ranges are not used.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::protocol::{
    constants::{DatagramFlags, UDP_HEADER_SIZE},
    packet::{DecodeError, RaknetEncodable},
    types::Sequence24,
};

/// Bytes before the first sequence number.
const ACK_HEADER_SIZE: usize = 1 + 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckKind {
    Ack,
    Nack,
}

impl AckKind {
    fn flag(&self) -> DatagramFlags {
        match self {
            AckKind::Ack => DatagramFlags::ACK,
            AckKind::Nack => DatagramFlags::NACK,
        }
    }
}

/// Sequence numbers carried by an ACK or NACK datagram.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AckNackPayload {
    pub sequences: Vec<Sequence24>,
}

impl AckNackPayload {
    pub fn new(sequences: Vec<Sequence24>) -> Self {
        Self { sequences }
    }

    /// Decodes a whole datagram whose first byte carries the ACK or NACK bit.
    /// ACK wins when both bits are set.
    pub fn decode_datagram(src: &mut impl Buf) -> Result<(AckKind, Self), DecodeError> {
        let flags = DatagramFlags::from_bits_truncate(u8::decode_raknet(src)?);
        let kind = if flags.contains(DatagramFlags::ACK) {
            AckKind::Ack
        } else {
            AckKind::Nack
        };
        Ok((kind, Self::decode_raknet(src)?))
    }

    /// Encodes the payload as one or more datagrams, none larger than `mtu`
    /// once IP and UDP headers are added.
    pub fn encode_datagrams(&self, kind: AckKind, mtu: u16) -> Vec<Bytes> {
        let per_datagram = ((mtu as usize).saturating_sub(UDP_HEADER_SIZE + ACK_HEADER_SIZE) / 3)
            .clamp(1, u16::MAX as usize);

        self.sequences
            .chunks(per_datagram)
            .map(|chunk| {
                let mut buf = BytesMut::with_capacity(ACK_HEADER_SIZE + chunk.len() * 3);
                buf.put_u8(kind.flag().bits());
                AckNackPayload::new(chunk.to_vec()).encode_raknet(&mut buf);
                buf.freeze()
            })
            .collect()
    }
}

impl RaknetEncodable for AckNackPayload {
    fn encode_raknet(&self, dst: &mut impl BufMut) {
        let count = self.sequences.len().min(u16::MAX as usize);
        (count as u16).encode_raknet(dst);
        for seq in &self.sequences[..count] {
            seq.encode_raknet(dst);
        }
    }

    fn decode_raknet(src: &mut impl Buf) -> Result<Self, DecodeError> {
        let count = u16::decode_raknet(src)? as usize;
        if src.remaining() < count * 3 {
            return Err(DecodeError::UnexpectedEof);
        }
        let mut sequences = Vec::with_capacity(count);
        for _ in 0..count {
            sequences.push(Sequence24::decode_raknet(src)?);
        }
        Ok(Self { sequences })
    }
}
