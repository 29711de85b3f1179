use bytes::Bytes;

use crate::protocol::{
    ack::{AckKind, AckNackPayload},
    constants::DatagramFlags,
    packet::DecodeError,
};

use super::Session;

/// What an inbound datagram turned into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// An ACK or NACK datagram, with the number of sequence numbers it named.
    Acknowledged(AckKind, usize),
    /// Payloads ready for dispatch: zero while a split is incomplete, else one.
    Messages(Vec<Bytes>),
}

impl Session {
    /// Routes one datagram: ACK/NACK datagrams update the resend table, data
    /// datagrams are unwrapped and unframed. Anything without the datagram
    /// flag is rejected before it can touch the sequence bookkeeping.
    pub fn handle_datagram(&mut self, mut datagram: Bytes) -> Result<Incoming, DecodeError> {
        let first = *datagram.first().ok_or(DecodeError::UnexpectedEof)?;

        if DatagramFlags::is_ack_or_nack(first) {
            let (kind, payload) = AckNackPayload::decode_datagram(&mut datagram)?;
            self.handle_ack_payload(kind, &payload);
            return Ok(Incoming::Acknowledged(kind, payload.sequences.len()));
        }
        // Offline messages (replies arriving late, stray pings) carry no datagram flag.
        if !DatagramFlags::from_bits_truncate(first).contains(DatagramFlags::VALID) {
            return Err(DecodeError::UnknownId(first));
        }

        let (sequence, mut frame) = self.sequencer.unwrap(&mut datagram)?;
        tracing::trace!(seq = sequence.value(), len = frame.len(), "data datagram");
        Ok(Incoming::Messages(self.reliability.unframe(&mut frame)?))
    }

    pub fn handle_ack_payload(&mut self, kind: AckKind, payload: &AckNackPayload) {
        match kind {
            AckKind::Ack => self.reliability.process_ack(&payload.sequences),
            AckKind::Nack => {
                tracing::debug!(count = payload.sequences.len(), "nack received");
                self.reliability.process_nack(&payload.sequences);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::packet::{OpenConnectionReply1, Packet};

    #[test]
    fn offline_message_is_rejected() {
        let mut session = Session::new(1492);
        let reply = OpenConnectionReply1 {
            server_guid: 1,
            server_has_security: false,
            mtu: 1492,
        };
        assert_eq!(
            session.handle_datagram(reply.encode()),
            Err(DecodeError::UnknownId(0x06))
        );
        assert!(session.take_ack_datagrams().is_empty());
    }

    #[test]
    fn empty_datagram_is_eof() {
        let mut session = Session::new(1492);
        assert_eq!(
            session.handle_datagram(Bytes::new()),
            Err(DecodeError::UnexpectedEof)
        );
    }

    #[test]
    fn valid_ack_flag_combination_is_an_ack() {
        let mut session = Session::new(1492);
        let datagram = Bytes::from_static(&[0xC0, 0x00, 0x01, 0x00, 0x00, 0x07]);
        assert_eq!(
            session.handle_datagram(datagram),
            Ok(Incoming::Acknowledged(AckKind::Ack, 1))
        );
    }
}
