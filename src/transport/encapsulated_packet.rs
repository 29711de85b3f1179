use crate::protocol::{
    constants::{DEFAULT_ORDER_CHANNEL, RELIABILITY_MASK, SPLIT_FLAG},
    packet::{DecodeError, RaknetEncodable},
    reliability::Reliability,
    types::Sequence24,
};
use bytes::{Buf, BufMut, Bytes};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitInfo {
    pub id: u32,
    pub count: u32,
    pub index: u32,
}

/// One reliability frame: the unit carried inside a data datagram.
///
/// Wire layout, in order:
/// - flags byte: tier in the low three bits, `0x10` when split
/// - 24-bit message index, reliable tiers only
/// - 24-bit order index and order channel byte, ordered and sequenced tiers
/// - split id, split count, split index (`u32` each), split frames only
/// - payload, running to the end of the datagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncapsulatedPacket {
    pub reliability: Reliability,
    pub message_index: Option<Sequence24>,
    pub order_index: Option<Sequence24>,
    pub order_channel: Option<u8>,
    pub split: Option<SplitInfo>,
    pub payload: Bytes,
}

impl EncapsulatedPacket {
    pub fn flags(&self) -> u8 {
        let mut flags = self.reliability as u8;
        if self.split.is_some() {
            flags |= SPLIT_FLAG;
        }
        flags
    }
}

impl RaknetEncodable for EncapsulatedPacket {
    fn encode_raknet(&self, dst: &mut impl BufMut) {
        dst.put_u8(self.flags());

        let rel = self.reliability;

        if rel.is_reliable() {
            self.message_index.unwrap_or_default().encode_raknet(dst);
        }

        if rel.is_ordered() {
            self.order_index.unwrap_or_default().encode_raknet(dst);
            self.order_channel
                .unwrap_or(DEFAULT_ORDER_CHANNEL)
                .encode_raknet(dst);
        }

        if let Some(split) = &self.split {
            split.id.encode_raknet(dst);
            split.count.encode_raknet(dst);
            split.index.encode_raknet(dst);
        }

        dst.put_slice(&self.payload);
    }

    fn decode_raknet(src: &mut impl Buf) -> Result<Self, DecodeError> {
        let flags = u8::decode_raknet(src)?;
        let is_split = flags & SPLIT_FLAG != 0;
        let rel = Reliability::from_u8(flags & RELIABILITY_MASK)?;

        let message_index = if rel.is_reliable() {
            Some(Sequence24::decode_raknet(src)?)
        } else {
            None
        };

        let (order_index, order_channel) = if rel.is_ordered() {
            let idx = Sequence24::decode_raknet(src)?;
            let ch = u8::decode_raknet(src)?;
            (Some(idx), Some(ch))
        } else {
            (None, None)
        };

        let split = if is_split {
            let id = u32::decode_raknet(src)?;
            let count = u32::decode_raknet(src)?;
            let index = u32::decode_raknet(src)?;
            Some(SplitInfo { id, count, index })
        } else {
            None
        };

        let remaining = src.remaining();
        let payload = src.copy_to_bytes(remaining);

        Ok(EncapsulatedPacket {
            reliability: rel,
            message_index,
            order_index,
            order_channel,
            split,
            payload,
        })
    }
}
