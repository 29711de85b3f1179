use crate::protocol::packet::DecodeError;

/// Delivery tier stored in the low three bits of a frame's flags byte.
///
/// The tier decides which index fields a frame carries and whether the
/// datagram holding it is tracked for resend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Reliability {
    Unreliable = 0,
    UnreliableSequenced = 1,
    Reliable = 2,
    #[default]
    ReliableOrdered = 3,
    ReliableSequenced = 4,
}

impl Reliability {
    pub fn from_u8(v: u8) -> Result<Self, DecodeError> {
        Ok(match v {
            0 => Reliability::Unreliable,
            1 => Reliability::UnreliableSequenced,
            2 => Reliability::Reliable,
            3 => Reliability::ReliableOrdered,
            4 => Reliability::ReliableSequenced,
            _ => return Err(DecodeError::UnknownReliability(v)),
        })
    }

    /// Tracked for resend and carries a message index.
    pub fn is_reliable(&self) -> bool {
        matches!(
            self,
            Reliability::Reliable | Reliability::ReliableOrdered | Reliability::ReliableSequenced
        )
    }

    /// Carries an order index and order channel.
    pub fn is_ordered(&self) -> bool {
        matches!(
            self,
            Reliability::UnreliableSequenced
                | Reliability::ReliableOrdered
                | Reliability::ReliableSequenced
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_index_fields() {
        use Reliability::*;
        let table = [
            (Unreliable, false, false),
            (UnreliableSequenced, false, true),
            (Reliable, true, false),
            (ReliableOrdered, true, true),
            (ReliableSequenced, true, true),
        ];
        for (tier, reliable, ordered) in table {
            assert_eq!(tier.is_reliable(), reliable, "{tier:?}");
            assert_eq!(tier.is_ordered(), ordered, "{tier:?}");
            assert_eq!(Reliability::from_u8(tier as u8).unwrap(), tier);
        }
    }

    #[test]
    fn unknown_tier() {
        assert!(matches!(
            Reliability::from_u8(5),
            Err(DecodeError::UnknownReliability(5))
        ));
    }
}
