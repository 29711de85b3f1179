use std::cmp::Ordering;

use crate::protocol::{packet::RaknetEncodable, types::U24};

const MODULO: u32 = 1 << 24;
const MASK: u32 = MODULO - 1;
const HALF: u32 = MODULO / 2;

/// Sequence type for a U24.
///
/// Comparison is serial-number arithmetic: `a < b` when `b` lies less than
/// half the number space ahead of `a`, so ordering survives the wrap from
/// `0xFF_FFFF` back to `0`. It is not a total order and must not be used as a
/// `BTreeMap` key.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub struct Sequence24(u32);

impl Sequence24 {
    pub const MAX: Sequence24 = Sequence24(MASK);

    pub fn new(v: u32) -> Sequence24 {
        Sequence24(v & MASK)
    }

    pub fn value(&self) -> u32 {
        self.0 & MASK
    }

    // clone mutations.

    pub fn next(&self) -> Sequence24 {
        Sequence24::new(self.0.wrapping_add(1))
    }

    /// Forward distance from `self` to `other`, modulo 2^24.
    pub fn distance_to(&self, other: Sequence24) -> u32 {
        other.value().wrapping_sub(self.value()) & MASK
    }
}

impl Ord for Sequence24 {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.distance_to(*other) {
            0 => Ordering::Equal,
            d if d < HALF => Ordering::Less,
            _ => Ordering::Greater,
        }
    }
}

impl PartialOrd for Sequence24 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<Sequence24> for U24 {
    fn from(seq: Sequence24) -> Self {
        U24(seq.value())
    }
}

impl From<U24> for Sequence24 {
    fn from(raw: U24) -> Self {
        Sequence24::new(raw.0)
    }
}

impl RaknetEncodable for Sequence24 {
    fn encode_raknet(&self, dst: &mut impl bytes::BufMut) {
        U24::from(*self).encode_raknet(dst);
    }

    fn decode_raknet(
        src: &mut impl bytes::Buf,
    ) -> Result<Self, crate::protocol::packet::DecodeError> {
        Ok(Sequence24::from(U24::decode_raknet(src)?))
    }
}
