//! Reliability framing, fragmentation, reassembly and the resend table.

use std::collections::HashMap;
use std::time::Instant;

use bytes::{Buf, Bytes, BytesMut};

use crate::protocol::{
    constants::{DEFAULT_ORDER_CHANNEL, MAX_SPLIT_COUNT, MAXIMUM_MTU_SIZE, SPLIT_HEADER_RESERVE},
    packet::{DecodeError, RaknetEncodable},
    reliability::Reliability,
    types::Sequence24,
};
use crate::session::split::SplitAssembler;
use crate::transport::encapsulated_packet::{EncapsulatedPacket, SplitInfo};

/// A sent datagram kept until the peer acknowledges it.
#[derive(Debug, Clone)]
pub struct ReliablePacket {
    pub sequence: Sequence24,
    /// The full datagram as it went on the wire.
    pub payload: Bytes,
    pub needs_resend: bool,
    pub sent_at: Instant,
}

/// Outbound framing counters plus inbound reassembly state for one
/// connection.
#[derive(Debug)]
pub struct ReliabilityLayer {
    mtu: u16,
    message_index: Sequence24,
    order_index: Sequence24,
    split_id: u32,
    resend_queue: HashMap<Sequence24, ReliablePacket>,
    splits: SplitAssembler,
}

impl Default for ReliabilityLayer {
    fn default() -> Self {
        Self::new(MAXIMUM_MTU_SIZE)
    }
}

impl ReliabilityLayer {
    pub fn new(mtu: u16) -> Self {
        Self {
            mtu,
            message_index: Sequence24::default(),
            order_index: Sequence24::default(),
            split_id: 0,
            resend_queue: HashMap::new(),
            splits: SplitAssembler::new(),
        }
    }

    pub fn mtu(&self) -> u16 {
        self.mtu
    }

    /// Largest payload carried by a single frame; anything longer is split.
    pub fn max_frame_payload(&self) -> usize {
        (self.mtu as usize).saturating_sub(SPLIT_HEADER_RESERVE).max(1)
    }

    /// Largest payload that can be split without exceeding the fragment
    /// limit the receiving side enforces.
    pub fn max_payload_len(&self) -> usize {
        self.max_frame_payload() * MAX_SPLIT_COUNT as usize
    }

    /// Frames `payload` with the tier's header fields. Payloads longer than
    /// `mtu - 60` become several frames sharing one split id and one order
    /// index; each fragment of a reliable tier takes its own message index.
    pub fn frame(&mut self, payload: Bytes, reliability: Reliability) -> Vec<Bytes> {
        let order_index = if reliability.is_ordered() {
            let idx = self.order_index;
            self.order_index = idx.next();
            Some(idx)
        } else {
            None
        };

        let limit = self.max_frame_payload();
        if payload.len() <= limit {
            return vec![self.encode_frame(reliability, order_index, None, payload)];
        }

        let id = self.split_id;
        self.split_id = self.split_id.wrapping_add(1);
        let count = payload.len().div_ceil(limit);

        (0..count)
            .map(|index| {
                let start = index * limit;
                let end = (start + limit).min(payload.len());
                let split = SplitInfo {
                    id,
                    count: count as u32,
                    index: index as u32,
                };
                self.encode_frame(reliability, order_index, Some(split), payload.slice(start..end))
            })
            .collect()
    }

    fn encode_frame(
        &mut self,
        reliability: Reliability,
        order_index: Option<Sequence24>,
        split: Option<SplitInfo>,
        payload: Bytes,
    ) -> Bytes {
        let message_index = if reliability.is_reliable() {
            let idx = self.message_index;
            self.message_index = idx.next();
            Some(idx)
        } else {
            None
        };

        let frame = EncapsulatedPacket {
            reliability,
            message_index,
            order_index,
            order_channel: order_index.map(|_| DEFAULT_ORDER_CHANNEL),
            split,
            payload,
        };
        let mut buf = BytesMut::with_capacity(frame.payload.len() + 20);
        frame.encode_raknet(&mut buf);
        buf.freeze()
    }

    /// Strips the frame header. Returns the payload, the reassembled message
    /// when this was the last missing fragment, or nothing while a split is
    /// still incomplete.
    ///
    /// Message and order indices are read but not enforced: duplicates are
    /// delivered again and delivery order is arrival order.
    pub fn unframe(&mut self, src: &mut impl Buf) -> Result<Vec<Bytes>, DecodeError> {
        let frame = EncapsulatedPacket::decode_raknet(src)?;

        tracing::trace!(
            reliability = ?frame.reliability,
            message_index = frame.message_index.map(|i| i.value()),
            order_index = frame.order_index.map(|i| i.value()),
            split = frame.split.is_some(),
            "unframe"
        );

        match frame.split {
            Some(split) => Ok(self.splits.add(split, frame.payload)?.into_iter().collect()),
            None => Ok(vec![frame.payload]),
        }
    }

    /// Tracks a sent datagram under its sequence number, replacing any
    /// earlier record for the same number.
    pub fn register(&mut self, sequence: Sequence24, datagram: Bytes) {
        self.resend_queue.insert(
            sequence,
            ReliablePacket {
                sequence,
                payload: datagram,
                needs_resend: false,
                sent_at: Instant::now(),
            },
        );
    }

    /// Drops acknowledged records. Unknown sequence numbers are ignored.
    pub fn process_ack(&mut self, acks: &[Sequence24]) {
        for seq in acks {
            self.resend_queue.remove(seq);
        }
    }

    /// Flags tracked records for resend. Unknown sequence numbers are ignored.
    pub fn process_nack(&mut self, nacks: &[Sequence24]) {
        for seq in nacks {
            if let Some(record) = self.resend_queue.get_mut(seq) {
                record.needs_resend = true;
            }
        }
    }

    /// Records flagged by a NACK, ascending by sequence number. The flag
    /// stays set until `mark_resent` is called.
    pub fn packets_due_for_resend(&self) -> Vec<&ReliablePacket> {
        let mut due: Vec<&ReliablePacket> = self
            .resend_queue
            .values()
            .filter(|record| record.needs_resend)
            .collect();
        due.sort_by_key(|record| record.sequence.value());
        due
    }

    /// Clears the resend flag after the caller re-sent the datagram.
    pub fn mark_resent(&mut self, sequence: Sequence24, now: Instant) {
        if let Some(record) = self.resend_queue.get_mut(&sequence) {
            record.needs_resend = false;
            record.sent_at = now;
        }
    }

    /// Number of datagrams awaiting acknowledgement.
    pub fn in_flight(&self) -> usize {
        self.resend_queue.len()
    }

    /// Number of split messages still missing fragments.
    pub fn pending_splits(&self) -> usize {
        self.splits.pending()
    }
}
