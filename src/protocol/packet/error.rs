use thiserror::Error;

/// Errors that may occur while decoding RakNet protocol values or packets.
///
/// This type is kept small and generic so it can be shared by all
/// `RaknetEncodable` implementations, packet bodies and the reliability
/// layer. A decode never leaves partial state behind; callers drop the
/// packet.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The buffer did not contain enough bytes to decode the requested value.
    #[error("Unexpected EoF, not enough bytes to read requested type.")]
    UnexpectedEof,

    /// A control packet ID was not recognised by the registry.
    #[error("Unknown Packet, ID: {0}")]
    UnknownId(u8),

    /// A specific packet was expected but another ID was found.
    #[error("Expected packet ID {expected:#04x}, found {found:#04x}")]
    UnexpectedId { expected: u8, found: u8 },

    /// The 16 byte offline magic did not match.
    #[error("Offline message magic mismatch.")]
    InvalidMagic,

    /// An address encoding used an unsupported version field.
    #[error(
        "An invalid IpAddress version was encountered:\n\
        Provided: {0}, expected: 4 or 6."
    )]
    InvalidAddrVersion(u8),

    #[error("An unknown reliability value was provided. Reliability byte: {0}")]
    UnknownReliability(u8),

    /// Split metadata that can never be reassembled.
    #[error("Invalid split fragment: id {id}, index {index} of {count}")]
    InvalidSplit { id: u32, count: u32, index: u32 },
}
