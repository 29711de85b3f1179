use bytes::{Buf, BufMut};
use std::mem;

use crate::protocol::constants::DEFAULT_UNCONNECTED_MAGIC;
use crate::protocol::packet::{DecodeError, RaknetEncodable};
use crate::protocol::types::Magic;

macro_rules! impl_raknet_int {
    ($ty:ty, $put:ident, $get:ident) => {
        impl RaknetEncodable for $ty {
            fn encode_raknet(&self, dst: &mut impl BufMut) {
                dst.$put(*self as _);
            }

            fn decode_raknet(src: &mut impl Buf) -> Result<Self, DecodeError> {
                let size = mem::size_of::<$ty>();
                if src.remaining() < size {
                    return Err(DecodeError::UnexpectedEof);
                }
                Ok(src.$get() as $ty)
            }
        }
    };
}

// Big-endian ints:
impl_raknet_int!(u8, put_u8, get_u8);
impl_raknet_int!(u16, put_u16, get_u16);
impl_raknet_int!(u32, put_u32, get_u32);
impl_raknet_int!(u64, put_u64, get_u64);

impl RaknetEncodable for bool {
    fn encode_raknet(&self, dst: &mut impl BufMut) {
        dst.put_u8(if *self { 1 } else { 0 });
    }

    fn decode_raknet(src: &mut impl Buf) -> Result<Self, DecodeError> {
        if !src.has_remaining() {
            return Err(DecodeError::UnexpectedEof);
        }
        Ok(src.get_u8() != 0)
    }
}

impl RaknetEncodable for Magic {
    fn encode_raknet(&self, dst: &mut impl BufMut) {
        dst.put_slice(self);
    }

    fn decode_raknet(src: &mut impl Buf) -> Result<Self, DecodeError> {
        let size = mem::size_of::<Self>();
        if src.remaining() < size {
            return Err(DecodeError::UnexpectedEof);
        }

        let mut magic = [0u8; 16];

        // This reads exactly 16 bytes and advances the Buf properly.
        src.copy_to_slice(&mut magic);

        Ok(magic)
    }
}

/// Writes the offline message magic.
pub fn encode_magic(dst: &mut impl BufMut) {
    DEFAULT_UNCONNECTED_MAGIC.encode_raknet(dst);
}

/// Reads 16 bytes and fails unless they are exactly the offline message magic.
pub fn decode_magic(src: &mut impl Buf) -> Result<(), DecodeError> {
    let magic = Magic::decode_raknet(src)?;
    if magic != DEFAULT_UNCONNECTED_MAGIC {
        return Err(DecodeError::InvalidMagic);
    }
    Ok(())
}
