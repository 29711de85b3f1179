use std::fmt;

/// Steps of the connected half of the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HandshakeStep {
    /// `OpenConnectionRequest2` sent, waiting for `OpenConnectionReply2`.
    OpenConnection = 1,
    /// `ConnectionRequest` sent, waiting for `ConnectionRequestAccepted`.
    ConnectionRequest = 2,
    /// Sending `NewIncomingConnection`; nothing is awaited.
    NewIncomingConnection = 3,
}

/// Client connection lifecycle.
///
/// `Disconnected -> MtuDetecting -> Handshaking(1..=3) -> Connected -> Disconnected`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    MtuDetecting,
    Handshaking(HandshakeStep),
    Connected,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => f.write_str("disconnected"),
            ConnectionState::MtuDetecting => f.write_str("mtu-detecting"),
            ConnectionState::Handshaking(step) => write!(f, "handshaking({})", *step as u8),
            ConnectionState::Connected => f.write_str("connected"),
        }
    }
}
