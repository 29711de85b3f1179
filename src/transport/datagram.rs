use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::protocol::{
    constants::RAKNET_DATAGRAM_HEADER_SIZE, packet::DecodeError, types::DatagramHeader,
};

/// A data datagram: sequence header followed by one reliability frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub header: DatagramHeader,
    pub payload: Bytes,
}

impl Datagram {
    pub fn encode(&self, dst: &mut impl BufMut) {
        self.header.encode(dst);
        dst.put_slice(&self.payload);
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(RAKNET_DATAGRAM_HEADER_SIZE + self.payload.len());
        self.encode(&mut buf);
        buf.freeze()
    }

    pub fn decode(src: &mut impl Buf) -> Result<Self, DecodeError> {
        let header = DatagramHeader::decode(src)?;
        let remaining = src.remaining();
        Ok(Self {
            header,
            payload: src.copy_to_bytes(remaining),
        })
    }
}
