pub mod connected;
pub mod open_connection;
pub mod unconnected;
mod error;
mod registry;

pub use connected::*;
pub use open_connection::*;
pub use unconnected::*;
pub use error::DecodeError;
pub use registry::RaknetPacket;

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Trait implemented by all concrete RakNet packet body types.
///
/// Implementations are responsible for encoding/decoding only the
/// packet body – the leading ID byte is handled by `encode`/`decode`
/// and by `RaknetPacket`.
pub trait Packet: Sized {
    /// The fixed ID byte used to identify this packet on the wire.
    const ID: u8;

    /// Encode the body of this packet into the destination buffer.
    fn encode_body(&self, dst: &mut impl BufMut);

    /// Decode the body of this packet from the source buffer.
    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError>;

    /// Encode the ID byte followed by the body.
    fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_u8(Self::ID);
        self.encode_body(&mut buf);
        buf.freeze()
    }

    /// Decode a full packet, rejecting any other leading ID byte.
    fn decode(src: &mut impl Buf) -> Result<Self, DecodeError> {
        if !src.has_remaining() {
            return Err(DecodeError::UnexpectedEof);
        }
        let id = src.get_u8();
        if id != Self::ID {
            return Err(DecodeError::UnexpectedId {
                expected: Self::ID,
                found: id,
            });
        }
        Self::decode_body(src)
    }
}

/// Trait for types that know how to encode/decode themselves using
/// the RakNet wire format.
pub trait RaknetEncodable: Sized {
    /// Encode this value into the destination buffer.
    fn encode_raknet(&self, dst: &mut impl BufMut);

    /// Decode a value of this type from the source buffer.
    fn decode_raknet(src: &mut impl Buf) -> Result<Self, DecodeError>;
}
