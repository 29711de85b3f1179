use bitflags::bitflags;
use std::time::Duration;

use crate::protocol::types::Magic;

pub const RAKNET_PROTOCOL_VERSION: u8 = 11; // Mojang's version.
pub const MINIMUM_MTU_SIZE: u16 = 576;
pub const MAXIMUM_MTU_SIZE: u16 = 1492;

/// Largest gap between two datagram sequence numbers that is still expanded
/// into individual NACK entries.
pub const MAX_WINDOW_SIZE: u32 = 2048;

/// IP header + UDP header.
pub const UDP_HEADER_SIZE: usize = 20 + 8;

/// Bytes of an `OpenConnectionRequest1` that are not padding:
/// IP + UDP headers, packet ID, magic and protocol byte.
pub const OPEN_CONNECTION_REQUEST_1_OVERHEAD: usize = 20 + 8 + 1 + 16 + 1;

/// Bytes reserved per datagram for headers when splitting payloads.
pub const SPLIT_HEADER_RESERVE: usize = 60;

pub const RAKNET_DATAGRAM_HEADER_SIZE: usize = 4;

/// Upper bound on the fragment count of one split message.
pub const MAX_SPLIT_COUNT: u32 = 1024;

/// Number of system addresses carried by `ConnectionRequestAccepted` and
/// `NewIncomingConnection`.
pub const SYSTEM_ADDRESS_COUNT: usize = 20;

/// Ordering channel used for every ordered or sequenced frame.
pub const DEFAULT_ORDER_CHANNEL: u8 = 0;

pub const MTU_PROBE_TIMEOUT: Duration = Duration::from_millis(500);
pub const OPEN_CONNECTION_TIMEOUT: Duration = Duration::from_secs(1);
pub const CONNECTION_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);
pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);
pub const PING_TIMEOUT: Duration = Duration::from_secs(5);
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(1);

/// Size of the socket receive buffer; comfortably above the largest MTU.
pub const RECV_BUFFER_SIZE: usize = 2048;

bitflags! {
    /// Flags in the first byte of every connected RakNet datagram.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct DatagramFlags: u8 {
        const VALID            = 0b1000_0000;
        const ACK              = 0b0100_0000;
        const NACK             = 0b0010_0000;

        const RELIABILITY_FLAGS = Self::ACK.bits() | Self::NACK.bits();
    }
}

impl DatagramFlags {
    /// Returns true when a raw first byte marks an ACK or NACK datagram.
    pub fn is_ack_or_nack(byte: u8) -> bool {
        Self::from_bits_truncate(byte).intersects(Self::RELIABILITY_FLAGS)
    }
}

/// Bit OR'd into the frame flags byte of every fragment.
pub const SPLIT_FLAG: u8 = 0x10;

/// Mask selecting the reliability tier from the frame flags byte.
pub const RELIABILITY_MASK: u8 = 0x07;

/// Message IDs understood by this crate.
pub mod id {
    pub const CONNECTED_PING: u8 = 0x00;
    pub const UNCONNECTED_PING: u8 = 0x01;
    pub const CONNECTED_PONG: u8 = 0x03;
    pub const OPEN_CONNECTION_REQUEST_1: u8 = 0x05;
    pub const OPEN_CONNECTION_REPLY_1: u8 = 0x06;
    pub const OPEN_CONNECTION_REQUEST_2: u8 = 0x07;
    pub const OPEN_CONNECTION_REPLY_2: u8 = 0x08;
    pub const CONNECTION_REQUEST: u8 = 0x09;
    pub const CONNECTION_REQUEST_ACCEPTED: u8 = 0x10;
    pub const NEW_INCOMING_CONNECTION: u8 = 0x13;
    pub const DISCONNECTION_NOTIFICATION: u8 = 0x15;
    pub const INCOMPATIBLE_PROTOCOL_VERSION: u8 = 0x19;
    pub const UNCONNECTED_PONG: u8 = 0x1c;
}

/// Magic used to identify RakNet packets
pub const DEFAULT_UNCONNECTED_MAGIC: Magic = [
    0x00, 0xFF, 0xFF, 0x00, 0xFE, 0xFE, 0xFE, 0xFE, 0xFD, 0xFD, 0xFD, 0xFD, 0x12, 0x34, 0x56, 0x78,
];

/*
 * IP constants
 */
pub const IPV4_MESSAGE_SIZE: usize = 7;
pub const IPV6_MESSAGE_SIZE: usize = 20;
