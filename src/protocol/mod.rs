//! RakNet protocol primitives, control packets, and related state.
//!
//! This module houses constants, packet definitions, encoding helpers and
//! connection state used by the higher–level session and transport layers.

pub mod ack;
pub mod constants;
pub mod packet;
pub mod reliability;
pub mod state;
pub mod types;
