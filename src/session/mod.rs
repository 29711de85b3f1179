//! Per-connection protocol state with no I/O attached.
//!
//! A `Session` turns application payloads into ready-to-send datagrams and
//! inbound datagrams back into payloads. The transport owns the socket and
//! decides when to flush ACKs and NACKs.

mod inbound;
pub mod reliability;
pub mod sequencer;
pub mod split;

use std::time::Instant;

use bytes::Bytes;

use crate::RaknetError;
use crate::protocol::{
    ack::{AckKind, AckNackPayload},
    reliability::Reliability,
    types::Sequence24,
};

pub use inbound::Incoming;
pub use reliability::{ReliabilityLayer, ReliablePacket};
pub use sequencer::DatagramSequencer;

#[derive(Debug)]
pub struct Session {
    mtu: u16,
    sequencer: DatagramSequencer,
    reliability: ReliabilityLayer,
}

impl Session {
    pub fn new(mtu: u16) -> Self {
        Self {
            mtu,
            sequencer: DatagramSequencer::new(),
            reliability: ReliabilityLayer::new(mtu),
        }
    }

    pub fn mtu(&self) -> u16 {
        self.mtu
    }

    /// Frames and sequences `payload`, returning one datagram per frame.
    /// Datagrams of reliable tiers are kept for resend until acknowledged.
    pub fn queue_packet(
        &mut self,
        payload: Bytes,
        reliability: Reliability,
    ) -> Result<Vec<Bytes>, RaknetError> {
        let max = self.reliability.max_payload_len();
        if payload.len() > max {
            return Err(RaknetError::PayloadTooLarge {
                len: payload.len(),
                max,
            });
        }

        let frames = self.reliability.frame(payload, reliability);
        let mut datagrams = Vec::with_capacity(frames.len());
        for frame in frames {
            let (sequence, datagram) = self.sequencer.wrap(frame);
            if reliability.is_reliable() {
                self.reliability.register(sequence, datagram.clone());
            }
            tracing::trace!(seq = sequence.value(), len = datagram.len(), "queued datagram");
            datagrams.push(datagram);
        }
        Ok(datagrams)
    }

    /// Drains the received set into ACK datagrams.
    pub fn take_ack_datagrams(&mut self) -> Vec<Bytes> {
        let acks = self.sequencer.drain_acks();
        if acks.is_empty() {
            return Vec::new();
        }
        AckNackPayload::new(acks).encode_datagrams(AckKind::Ack, self.mtu)
    }

    /// Drains the missing set into NACK datagrams.
    pub fn take_nack_datagrams(&mut self) -> Vec<Bytes> {
        let nacks = self.sequencer.drain_nacks();
        if nacks.is_empty() {
            return Vec::new();
        }
        AckNackPayload::new(nacks).encode_datagrams(AckKind::Nack, self.mtu)
    }

    /// Datagrams flagged by a NACK, with the sequence number they were sent
    /// under. Call `mark_resent` once each is back on the wire.
    pub fn resend_due(&self) -> Vec<(Sequence24, Bytes)> {
        self.reliability
            .packets_due_for_resend()
            .into_iter()
            .map(|record| (record.sequence, record.payload.clone()))
            .collect()
    }

    pub fn mark_resent(&mut self, sequence: Sequence24) {
        self.reliability.mark_resent(sequence, Instant::now());
    }

    /// Number of reliable datagrams not yet acknowledged.
    pub fn in_flight(&self) -> usize {
        self.reliability.in_flight()
    }

    pub fn pending_splits(&self) -> usize {
        self.reliability.pending_splits()
    }
}
