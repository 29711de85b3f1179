//! Datagram sequencing: outbound sequence numbers and inbound gap tracking.

use std::collections::BTreeSet;

use bytes::{Buf, Bytes};

use crate::protocol::{
    constants::MAX_WINDOW_SIZE,
    packet::DecodeError,
    types::{DatagramHeader, Sequence24},
};
use crate::transport::datagram::Datagram;

/// Assigns a 24-bit sequence number to every outgoing datagram and records
/// which inbound sequence numbers were seen or skipped.
///
/// No reordering happens here; the reliability layer sees payloads in
/// arrival order.
#[derive(Debug, Default)]
pub struct DatagramSequencer {
    next_sequence: Sequence24,
    highest_seen: Option<Sequence24>,
    // Keyed by raw value: `Sequence24` ordering is wrap-aware and not total.
    received: BTreeSet<u32>,
    missing: BTreeSet<u32>,
}

impl DatagramSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts outbound numbering at `sequence` instead of zero.
    pub fn starting_at(sequence: Sequence24) -> Self {
        Self {
            next_sequence: sequence,
            ..Self::default()
        }
    }

    /// The sequence number the next `wrap` will use.
    pub fn next_sequence(&self) -> Sequence24 {
        self.next_sequence
    }

    /// Prefixes `payload` with the datagram flag and the next sequence
    /// number, then advances the counter.
    pub fn wrap(&mut self, payload: Bytes) -> (Sequence24, Bytes) {
        let sequence = self.next_sequence;
        self.next_sequence = sequence.next();

        let datagram = Datagram {
            header: DatagramHeader::new(sequence),
            payload,
        };
        (sequence, datagram.to_bytes())
    }

    /// Strips the datagram header and records its sequence number.
    pub fn unwrap(&mut self, src: &mut impl Buf) -> Result<(Sequence24, Bytes), DecodeError> {
        let datagram = Datagram::decode(src)?;
        let sequence = datagram.header.sequence;
        self.record(sequence);
        Ok((sequence, datagram.payload))
    }

    fn record(&mut self, sequence: Sequence24) {
        self.received.insert(sequence.value());
        self.missing.remove(&sequence.value());

        match self.highest_seen {
            None => {
                // Nothing seen yet: everything below the first arrival was skipped.
                if sequence.value() <= MAX_WINDOW_SIZE {
                    self.missing.extend(0..sequence.value());
                } else {
                    tracing::debug!(seq = sequence.value(), "first datagram beyond window");
                }
                self.highest_seen = Some(sequence);
            }
            Some(highest) if sequence > highest => {
                let gap = highest.distance_to(sequence) - 1;
                if gap <= MAX_WINDOW_SIZE {
                    let mut skipped = highest.next();
                    while skipped != sequence {
                        if !self.received.contains(&skipped.value()) {
                            self.missing.insert(skipped.value());
                        }
                        skipped = skipped.next();
                    }
                } else {
                    tracing::debug!(
                        from = highest.value(),
                        to = sequence.value(),
                        "sequence gap exceeds window, not tracked"
                    );
                }
                self.highest_seen = Some(sequence);
            }
            _ => {}
        }
    }

    /// Sequence numbers seen since the last drain, ascending.
    pub fn drain_acks(&mut self) -> Vec<Sequence24> {
        std::mem::take(&mut self.received)
            .into_iter()
            .map(Sequence24::new)
            .collect()
    }

    /// Sequence numbers skipped and not yet seen, ascending.
    pub fn drain_nacks(&mut self) -> Vec<Sequence24> {
        std::mem::take(&mut self.missing)
            .into_iter()
            .map(Sequence24::new)
            .collect()
    }
}
