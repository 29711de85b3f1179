use bytes::{Buf, BufMut};

use crate::protocol::{
    constants::{DatagramFlags, RAKNET_DATAGRAM_HEADER_SIZE},
    packet::{DecodeError, RaknetEncodable},
    types::Sequence24,
};

/// Flag byte plus 24-bit sequence number at the front of every data datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatagramHeader {
    pub flags: DatagramFlags,
    pub sequence: Sequence24,
}

impl DatagramHeader {
    pub fn new(sequence: Sequence24) -> Self {
        Self {
            flags: DatagramFlags::VALID,
            sequence,
        }
    }

    pub fn encode(&self, dst: &mut impl BufMut) {
        dst.put_u8(self.flags.bits());
        self.sequence.encode_raknet(dst);
    }

    pub fn decode(src: &mut impl Buf) -> Result<Self, DecodeError> {
        if src.remaining() < RAKNET_DATAGRAM_HEADER_SIZE {
            return Err(DecodeError::UnexpectedEof);
        }
        let raw_flags = src.get_u8();
        let flags = DatagramFlags::from_bits_truncate(raw_flags);
        let sequence = Sequence24::decode_raknet(src)?;
        Ok(DatagramHeader { flags, sequence })
    }
}
