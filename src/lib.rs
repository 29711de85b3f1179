//! A compact RakNet client and ping responder built on Tokio.
//!
//! - `protocol`: wire codecs, constants and the reliability tier enum.
//! - `session`: per-connection sequencing, framing, reassembly and resend
//!   bookkeeping, free of any I/O.
//! - `transport`: the UDP-facing `RaknetClient` and `RaknetServer`.

pub mod error;
pub mod protocol;
pub mod session;
pub mod transport;

pub use error::RaknetError;
pub use protocol::reliability::Reliability;
pub use transport::{
    Message, RaknetClient, RaknetClientConfig, RaknetServer, RaknetServerConfig,
};
