use thiserror::Error;

use crate::protocol::packet::DecodeError;

/// Errors surfaced by the client and server handles.
#[derive(Debug, Error)]
pub enum RaknetError {
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed packet: {0}")]
    Decode(#[from] DecodeError),

    /// Names the step that did not get an answer in time.
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("no MTU between the configured bounds was accepted")]
    MtuDetectionFailed,

    #[error("not connected")]
    NotConnected,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("already running")]
    AlreadyRunning,

    #[error("payload of {len} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { len: usize, max: usize },
}
