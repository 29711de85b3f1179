use bytes::{Buf, BufMut, Bytes};

use super::{
    ConnectedPing, ConnectedPong, ConnectionRequest, ConnectionRequestAccepted, DecodeError,
    DisconnectionNotification, IncompatibleProtocolVersion, NewIncomingConnection,
    OpenConnectionReply1, OpenConnectionReply2, OpenConnectionRequest1, OpenConnectionRequest2,
    Packet, UnconnectedPing, UnconnectedPong,
};

/// Generates `RaknetPacket`, which the client session and the ping
/// responder decode every message through.
macro_rules! define_raknet_packets {
    (
        $(
            $name:ident,
        )+
    ) => {
        /// Every message this crate understands, plus opaque user data.
        #[derive(Debug, Clone)]
        pub enum RaknetPacket {
            $(
                $name($name),
            )+
            UserData { id: u8, payload: Bytes },
        }

        impl RaknetPacket {
            /// Decode by leading ID. IDs without a registered message are
            /// surfaced as `UserData` so application payloads pass through.
            pub fn decode(src: &mut impl Buf) -> Result<Self, DecodeError> {
                if !src.has_remaining() {
                    return Err(DecodeError::UnexpectedEof);
                }
                let id = src.get_u8();
                Ok(match id {
                    $(
                        <$name as Packet>::ID => {
                            RaknetPacket::$name(<$name as Packet>::decode_body(src)?)
                        }
                    )+
                    other => {
                        let remaining = src.remaining();
                        RaknetPacket::UserData { id: other, payload: src.copy_to_bytes(remaining) }
                    }
                })
            }

            pub fn id(&self) -> u8 {
                match self {
                    $(
                        RaknetPacket::$name(_inner) => <$name as Packet>::ID,
                    )+
                    RaknetPacket::UserData { id, .. } => *id,
                }
            }

            pub fn encode(&self, dst: &mut impl BufMut) {
                dst.put_u8(self.id());
                match self {
                    $(
                        RaknetPacket::$name(inner) => inner.encode_body(dst),
                    )+
                    RaknetPacket::UserData { payload, .. } => dst.put_slice(payload),
                }
            }
        }
    }
}

define_raknet_packets! {
    ConnectedPing,
    UnconnectedPing,
    ConnectedPong,
    OpenConnectionRequest1,
    OpenConnectionReply1,
    OpenConnectionRequest2,
    OpenConnectionReply2,
    ConnectionRequest,
    ConnectionRequestAccepted,
    NewIncomingConnection,
    DisconnectionNotification,
    IncompatibleProtocolVersion,
    UnconnectedPong,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::RaknetTime;
    use bytes::BytesMut;

    #[test]
    fn dispatches_by_id() {
        let ping = ConnectedPing {
            timestamp: RaknetTime(42),
        };
        let mut slice = ping.encode();
        match RaknetPacket::decode(&mut slice).unwrap() {
            RaknetPacket::ConnectedPing(p) => assert_eq!(p.timestamp, RaknetTime(42)),
            other => panic!("unexpected packet {:#04x}", other.id()),
        }
    }

    #[test]
    fn unknown_ids_are_user_data() {
        let mut slice: &[u8] = &[0xFE, 1, 2, 3];
        let pkt = RaknetPacket::decode(&mut slice).unwrap();
        assert_eq!(pkt.id(), 0xFE);

        let mut buf = BytesMut::new();
        pkt.encode(&mut buf);
        assert_eq!(&buf[..], &[0xFE, 1, 2, 3]);
    }

    #[test]
    fn empty_buffer_is_eof() {
        let mut slice: &[u8] = &[];
        assert!(matches!(
            RaknetPacket::decode(&mut slice),
            Err(DecodeError::UnexpectedEof)
        ));
    }
}
